//! Stable error codes shared by configuration and runtime errors.
//!
//! Codes serialize as `snake_case` strings so callers (and any reporting
//! layer) can match on them without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable classification of every error the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ─── Configuration (fatal, raised before any prediction) ────────────
    /// The corpus contains no texts.
    EmptyCorpus,
    /// Texts and labels differ in length.
    LengthMismatch,
    /// A requested concept is not registered.
    UnknownConcept,
    /// A concept with the same name is already registered.
    DuplicateConcept,
    /// A configuration value is out of range.
    InvalidValue,
    /// No built-in concept registry exists for the requested language.
    UnsupportedLanguage,

    // ─── Recoverable (absorbed at text / batch / sample scope) ──────────
    /// A text could not be tokenized and was skipped.
    TokenizationFailed,
    /// The predictor returned an error for a batch.
    PredictorFailed,
    /// The predictor panicked while scoring a batch.
    PredictorPanicked,
    /// The predictor returned the wrong number of rows, or a row without
    /// the class the delta policy needs.
    ShapeMismatch,
    /// A score was NaN or infinite.
    NonFiniteScore,
    /// The source text of a sample has no usable prediction.
    OriginalScoreMissing,
}

impl ErrorCode {
    /// The serialized `snake_case` name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmptyCorpus => "empty_corpus",
            ErrorCode::LengthMismatch => "length_mismatch",
            ErrorCode::UnknownConcept => "unknown_concept",
            ErrorCode::DuplicateConcept => "duplicate_concept",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::UnsupportedLanguage => "unsupported_language",
            ErrorCode::TokenizationFailed => "tokenization_failed",
            ErrorCode::PredictorFailed => "predictor_failed",
            ErrorCode::PredictorPanicked => "predictor_panicked",
            ErrorCode::ShapeMismatch => "shape_mismatch",
            ErrorCode::NonFiniteScore => "non_finite_score",
            ErrorCode::OriginalScoreMissing => "original_score_missing",
        }
    }

    /// Whether this code describes a fatal configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ErrorCode::EmptyCorpus
                | ErrorCode::LengthMismatch
                | ErrorCode::UnknownConcept
                | ErrorCode::DuplicateConcept
                | ErrorCode::InvalidValue
                | ErrorCode::UnsupportedLanguage
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
