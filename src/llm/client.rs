//! Core LLM client trait and error type

use std::time::Duration;

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used when the request does not name one
    fn model(&self) -> &str;

    /// Whether the client has what it needs to make calls
    fn is_ready(&self) -> bool;
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::MissingApiKey { .. } => false,
        }
    }

    /// Map a transport failure, separating timeouts from other network errors
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Network(err)
        }
    }
}
