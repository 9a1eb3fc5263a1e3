//! Core types for rapid_counterfactual
//!
//! This module defines the fundamental data structures used throughout the
//! library: tokens, ground-truth labels, the input corpus, and run
//! configuration.

use crate::errors::{BiasError, Result};
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Token
// ============================================================================

/// A token from the input text
///
/// Tokens keep their trailing whitespace so that concatenating
/// `text + whitespace` over a whole sequence reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The surface form (original text)
    pub text: String,
    /// Whitespace following the token in the original text
    pub whitespace: String,
    /// Lower-cased surface form
    pub lower: String,
    /// The lemmatized form (lower-cased)
    pub lemma: String,
    /// Byte offset (start) in original text
    pub start: usize,
    /// Token index within the text
    pub index: usize,
}

impl Token {
    /// Create a new token
    pub fn new(
        text: impl Into<String>,
        whitespace: impl Into<String>,
        lemma: impl Into<String>,
        start: usize,
        index: usize,
    ) -> Self {
        let text = text.into();
        let lower = text.to_lowercase();
        Self {
            text,
            whitespace: whitespace.into(),
            lower,
            lemma: lemma.into(),
            start,
            index,
        }
    }

    /// Byte offset one past the last byte of the surface text
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Whether this token consists only of whitespace
    pub fn is_space(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(char::is_whitespace)
    }

    /// Check whether the token's normalized forms equal a keyword form
    ///
    /// `form` must already be lower-cased. Either the lower-cased surface or
    /// the lemma has to match exactly; substrings never match.
    pub fn matches_form(&self, form: &str) -> bool {
        self.lower == form || self.lemma == form
    }
}

// ============================================================================
// Labels
// ============================================================================

/// A ground-truth label attached to an input text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::Text(value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{v}"),
            Label::Text(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// Runtime options
// ============================================================================

/// Threading controls for the optional parallel code paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Maximum number of Rayon threads for parallel work.
    /// `None` uses Rayon's default (all logical cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Disable parallelism entirely (equivalent to `max_threads: 1`).
    /// When `true`, overrides `max_threads`.
    #[serde(default)]
    pub single_thread: bool,
}

impl RuntimeOptions {
    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    /// Build a scoped Rayon thread pool matching these options.
    ///
    /// Returns `None` when no thread limit is set (use global pool) or when
    /// the pool cannot be created.
    pub fn build_thread_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.effective_threads()?;
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .ok()
    }

    /// Execute `f` within a scoped Rayon thread pool matching these options.
    ///
    /// If no thread limit is set, `f` runs directly (using the global pool).
    /// Otherwise `f` runs inside [`rayon::ThreadPool::install`], so any
    /// `par_iter()` within `f` uses the scoped pool.
    pub fn scoped<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match self.build_thread_pool() {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a counterfactual bias detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of texts passed to the predictor per call
    pub batch_size: usize,
    /// Upper bound on counterfactual samples per concept (None = unbounded)
    pub max_counterfactual_samples: Option<usize>,
    /// Upper bound on counterfactual samples per (text, concept)
    pub max_counterfactual_samples_per_text: Option<usize>,
    /// Keywords with fewer scored samples are omitted from headline stats
    pub min_keyword_occurrences: usize,
    /// Seed for every random subsampling step
    pub seed: u64,
    /// Only substitute keywords that share a grammatical function
    pub respect_function: bool,
    /// Score batches in parallel (requires a stateless predictor)
    pub parallel_batches: bool,
    /// Process concepts in parallel (requires a stateless predictor)
    pub parallel_concepts: bool,
    /// Texts longer than this many bytes fail tokenization and are skipped
    pub max_text_bytes: Option<usize>,
    /// Thread pool limits
    pub runtime: RuntimeOptions,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            max_counterfactual_samples: None,
            max_counterfactual_samples_per_text: None,
            min_keyword_occurrences: 5,
            seed: 42,
            respect_function: true,
            parallel_batches: false,
            parallel_concepts: false,
            max_text_bytes: None,
            runtime: RuntimeOptions::default(),
        }
    }
}

impl DetectorConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BiasError::invalid_config(
                "/config/batch_size",
                "batch_size must be > 0",
            ));
        }

        if self.max_counterfactual_samples == Some(0) {
            return Err(BiasError::invalid_config(
                "/config/max_counterfactual_samples",
                "max_counterfactual_samples must be a positive integer",
            ));
        }

        if self.max_counterfactual_samples_per_text == Some(0) {
            return Err(BiasError::invalid_config(
                "/config/max_counterfactual_samples_per_text",
                "max_counterfactual_samples_per_text must be a positive integer",
            ));
        }

        if self.max_text_bytes == Some(0) {
            return Err(BiasError::invalid_config(
                "/config/max_text_bytes",
                "max_text_bytes must be > 0",
            ));
        }

        if self.runtime.max_threads == Some(0) {
            return Err(BiasError::invalid_config(
                "/config/runtime/max_threads",
                "max_threads must be > 0",
            ));
        }

        Ok(())
    }

    /// Builder method: set predictor batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method: cap counterfactual samples per concept
    pub fn with_max_counterfactual_samples(mut self, max: usize) -> Self {
        self.max_counterfactual_samples = Some(max);
        self
    }

    /// Builder method: cap counterfactual samples per text and concept
    pub fn with_max_counterfactual_samples_per_text(mut self, max: usize) -> Self {
        self.max_counterfactual_samples_per_text = Some(max);
        self
    }

    /// Builder method: set the significance threshold
    pub fn with_min_keyword_occurrences(mut self, min: usize) -> Self {
        self.min_keyword_occurrences = min;
        self
    }

    /// Builder method: set the subsampling seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method: toggle function-respecting substitution
    pub fn with_respect_function(mut self, respect: bool) -> Self {
        self.respect_function = respect;
        self
    }

    /// Builder method: toggle parallel batch scoring
    pub fn with_parallel_batches(mut self, parallel: bool) -> Self {
        self.parallel_batches = parallel;
        self
    }

    /// Builder method: toggle parallel concept processing
    pub fn with_parallel_concepts(mut self, parallel: bool) -> Self {
        self.parallel_concepts = parallel;
        self
    }

    /// Builder method: reject texts longer than `max` bytes
    pub fn with_max_text_bytes(mut self, max: usize) -> Self {
        self.max_text_bytes = Some(max);
        self
    }

    /// Builder method: limit the thread pool
    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.runtime.max_threads = Some(threads);
        self
    }
}

// ============================================================================
// Corpus
// ============================================================================

/// Input texts with optional ground-truth labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub texts: Vec<String>,
    #[serde(default)]
    pub labels: Option<Vec<Label>>,
}

impl Corpus {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
            labels: None,
        }
    }

    pub fn with_labels<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Check that the corpus is non-empty and labels line up with texts.
    pub fn validate(&self) -> Result<()> {
        if self.texts.is_empty() {
            return Err(BiasError::config(
                ErrorCode::EmptyCorpus,
                "/texts",
                "corpus contains no texts",
            ));
        }
        if let Some(labels) = &self.labels {
            if labels.len() != self.texts.len() {
                return Err(BiasError::Config(
                    ConfigError::new(
                        ErrorCode::LengthMismatch,
                        "/labels",
                        format!(
                            "expected {} labels to match {} texts, got {}",
                            self.texts.len(),
                            self.texts.len(),
                            labels.len()
                        ),
                    )
                    .with_hint("pass one label per text, or no labels at all"),
                ));
            }
        }
        Ok(())
    }
}
