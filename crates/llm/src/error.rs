use thiserror::Error;

/// Errors from the completion API
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream rate limit reached")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed completion: {0}")]
    MalformedResponse(String),
}
