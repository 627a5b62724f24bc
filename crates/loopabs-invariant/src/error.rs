//! Error type for invariant sources

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvariantError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failure
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// API key environment variable not set
    #[error("LLM provider not configured. Set the {0} environment variable")]
    NotConfigured(String),

    /// Invariant table could not be read
    #[error("Failed to read invariant table: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for InvariantError {
    fn from(err: reqwest::Error) -> Self {
        InvariantError::NetworkError(err.to_string())
    }
}
