//! # rapid_counterfactual
//!
//! Counterfactual bias detection for text classifiers.
//!
//! Texts mentioning a protected concept (gender, religion, ...) are rewritten
//! by swapping one concept keyword for another, and the classifier is asked
//! to score both versions. Large, consistent score shifts for a keyword are a
//! bias signal.
//!
//! ## Features
//!
//! - **Exact**: substitution preserves every byte outside the swapped span,
//!   including whitespace, punctuation and casing style
//! - **Bounded**: per-text and per-concept sample budgets with seeded,
//!   reproducible subsampling
//! - **Robust**: a failing or panicking predictor batch only fails its own
//!   samples
//! - **Deterministic**: statistics do not depend on sample order or thread
//!   count
//!
//! ```
//! use rapid_counterfactual::{Concept, ConceptRegistry, Corpus, CounterfactualBiasDetector, FnPredictor};
//!
//! let mut registry = ConceptRegistry::new();
//! registry.register(Concept::from_words("gender", ["he", "she"])).unwrap();
//!
//! let detector = CounterfactualBiasDetector::with_registry(registry);
//! let corpus = Corpus::new(["He is a doctor.", "She is a nurse."]);
//! let model = FnPredictor::new(|batch: &[&str]| {
//!     Ok(batch
//!         .iter()
//!         .map(|t| if t.starts_with("She") { vec![0.2, 0.8] } else { vec![0.6, 0.4] })
//!         .collect())
//! });
//!
//! let result = detector.process(&corpus, &model).unwrap();
//! let gender = result.concept("gender").unwrap();
//! assert_eq!(gender.samples.len(), 2);
//! println!("{result}");
//! ```

pub mod aggregate;
pub mod concepts;
pub mod counterfactual;
pub mod errors;
pub mod nlp;
pub mod pipeline;
pub mod results;
pub mod scoring;
pub mod types;

// Re-export commonly used types
pub use errors::{BiasError, Result};
pub use types::{Corpus, DetectorConfig, Label, RuntimeOptions, Token};

// Re-export main functionality
pub use aggregate::{aggregate, Aggregator, DeltaStats, PairStats};
pub use concepts::{detect, Concept, ConceptDetector, ConceptRegistry, Keyword, TextMatches};
pub use counterfactual::{CasePattern, CounterfactualGenerator, CounterfactualSample, SampleScore};
pub use nlp::{TextProcessor, TextRepresentation, Tokenizer};
pub use pipeline::{
    CollectingObserver, ConfigError, CounterfactualBiasDetector, ErrorCode, NoopObserver,
    ObserverEvent, PipelineObserver, StageFailure,
};
pub use results::{ConceptResult, ConceptSummary, DetectionResult, SkippedText};
pub use scoring::{
    AbsoluteClassDifference, ClassDifference, DeltaPolicy, FnPredictor, L1Distance,
    PositiveClassesDifference, PredictError, Predictor, ScoreVector, ScoringEngine,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
