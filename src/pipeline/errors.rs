//! Structured error types for configuration and runtime failures.
//!
//! Two types cover the full run lifecycle:
//!
//! - [`ConfigError`]: problems with the caller's inputs found before any
//!   prediction call (mismatched labels, unknown concepts, bad budgets).
//!   These are fatal.
//! - [`StageFailure`]: failures absorbed during a run (a text that could
//!   not be tokenized, a predictor batch that errored, a NaN score). These
//!   are recorded on the affected text or sample and never abort the run.
//!
//! Both carry a stable [`ErrorCode`], a JSON-pointer style `path` naming the
//! offending input, a human-readable `message`, and an optional `hint`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error_code::ErrorCode;

// ─── Configuration errors ───────────────────────────────────────────────────

/// An invalid input detected before processing begins.
///
/// # Display format
///
/// ```text
/// [length_mismatch] /labels: expected 3 labels to match 3 texts, got 2
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path}: {message}")]
pub struct ConfigError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// Pointer to the offending input, e.g. `"/labels"`,
    /// `"/concepts_to_consider/1"`, `"/config/batch_size"`.
    pub path: String,

    /// Human-readable description of the problem.
    pub message: String,

    /// Optional suggestion for how to fix the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ConfigError {
    /// Create a new configuration error.
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix the problem.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ─── Recoverable runtime failures ───────────────────────────────────────────

/// A failure isolated to one text, batch, or sample.
///
/// # Display format
///
/// ```text
/// [predictor_failed] /batches/3 (stage: score): model server unavailable
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path} (stage: {stage}): {message}")]
pub struct StageFailure {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// Pointer to the affected unit, e.g. `"/texts/12"` or `"/batches/3"`.
    pub path: String,

    /// Name of the stage that failed (`"tokenize"`, `"score"`, ...).
    pub stage: String,

    /// Human-readable description of the failure.
    pub message: String,

    /// Optional suggestion for how to fix or work around the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StageFailure {
    /// Create a new stage failure.
    pub fn new(
        code: ErrorCode,
        path: impl Into<String>,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            stage: stage.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix or work around the failure.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
