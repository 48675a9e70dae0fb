//! Error types for the LLM provider port.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors a [`crate::Provider`] implementation may return, and that a
/// phase executor wraps as the `PROVIDER` taxonomy tag.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to serialize/deserialize a request or response.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Provider-side authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    /// Required API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// The requested model id is not known to the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider (or its backing service) is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Provider-side rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider returned a response this crate could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call was cancelled by its caller before completing.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The call exceeded its deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Catch-all for provider-specific failures that don't fit another
    /// variant; preserves the underlying message for `Is`/`As`-style
    /// inspection at the call site.
    #[error("provider error: {0}")]
    ProviderError(String),
}

impl LlmError {
    /// Whether a caller may reasonably retry the call that produced this
    /// error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ServiceUnavailable(_)
                | LlmError::RateLimitExceeded(_)
                | LlmError::DeadlineExceeded(_)
        )
    }

    /// Whether this error stems from an authentication problem.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}
