//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found (HTTP 404)
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Every retry attempt failed with a retryable error
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: Box<LLMError>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP client error
    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// HTTP status code associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(_) => Some(401),
            Self::RateLimitExceeded(_) => Some(429),
            Self::InvalidRequest(_) => Some(400),
            Self::ModelNotFound(_) => Some(404),
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            #[cfg(feature = "gemini")]
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Build the error matching an HTTP status code and response body
    pub fn from_status(status: u16, body: String) -> Self {
        if body.contains("API_KEY_INVALID") {
            return Self::AuthenticationFailed(body);
        }
        match status {
            400 => Self::InvalidRequest(body),
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::ModelNotFound(body),
            429 => Self::RateLimitExceeded(body),
            _ => Self::HttpStatus {
                status,
                message: body,
            },
        }
    }
}
