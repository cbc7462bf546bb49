//! Error types for macrolog
//!
//! Centralized error handling using thiserror. Every failure of an
//! interpretation maps to exactly one `InterpretError` variant, and each
//! variant carries a stable machine-readable kind for the response envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpreter::ExtractError;
use crate::llm::LlmError;

/// All the ways an interpretation can fail
#[derive(Debug, Error)]
pub enum InterpretError {
    /// Caller-supplied description is empty or otherwise unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model service could not be reached or refused the request
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] LlmError),

    /// The model answered but the reply is not a valid nutrition record
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(#[from] ExtractError),

    /// The host abandoned the call before the model answered
    #[error("Interpretation cancelled")]
    Cancelled,
}

/// Machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ModelUnavailable,
    MalformedModelOutput,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::MalformedModelOutput => "malformed_model_output",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InterpretError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InterpretError::InvalidInput(_) => ErrorKind::InvalidInput,
            InterpretError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            InterpretError::MalformedModelOutput(_) => ErrorKind::MalformedModelOutput,
            InterpretError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a caller-driven retry could succeed.
    ///
    /// Only transient transport failures qualify; bad input and unparseable
    /// replies are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            InterpretError::ModelUnavailable(e) => e.is_retryable(),
            InterpretError::InvalidInput(_) => false,
            InterpretError::MalformedModelOutput(_) => false,
            InterpretError::Cancelled => false,
        }
    }
}

/// Result type alias for interpreter operations
pub type Result<T> = std::result::Result<T, InterpretError>;
