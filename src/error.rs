//! Error types for the forward relay bot

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {

    // =============================
    // Construction / Configuration
    // =============================

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // =============================
    // Generation Backend
    // =============================

    #[error("API key not configured: {0}")]
    ApiKeyMissing(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Input rejected: {0}")]
    InputRejected(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RelayError {
    /// Shorthand for configuration precondition failures
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
