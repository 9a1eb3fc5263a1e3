//! Error types for rapid_counterfactual
//!
//! Only configuration problems are fatal. Everything that can go wrong while
//! tokenizing or scoring an individual text is absorbed and recorded as a
//! [`StageFailure`](crate::pipeline::errors::StageFailure) instead.

use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::ConfigError;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BiasError>;

/// Main error type for rapid_counterfactual
#[derive(Error, Debug, Clone)]
pub enum BiasError {
    /// The caller's inputs or configuration are invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A text could not be turned into a token sequence
    #[error("Tokenization failed: {message}")]
    Tokenization { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BiasError {
    /// Create a configuration error
    pub fn config(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config(ConfigError::new(code, path, message))
    }

    /// Create an invalid-value configuration error
    pub fn invalid_config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::config(ErrorCode::InvalidValue, path, message)
    }

    /// Create a tokenization error
    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::Tokenization {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is a fatal configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The stable error code for configuration and tokenization errors
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Config(err) => Some(err.code),
            Self::Tokenization { .. } => Some(ErrorCode::TokenizationFailed),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BiasError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
