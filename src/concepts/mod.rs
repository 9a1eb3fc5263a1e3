//! Protected concepts: keyword definitions, the registry, and detection.

mod builtin;
pub mod concept;
pub mod detector;
pub mod registry;

pub use concept::{Concept, Keyword};
pub use detector::{detect, ConceptDetector, KeywordOccurrence, TextMatches};
pub use registry::ConceptRegistry;
