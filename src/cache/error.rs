//! Cache error types
//!
//! Tier implementations surface these; the cache manager logs and swallows
//! them so a broken tier degrades to a cache miss.

use thiserror::Error;

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    /// Tier could not be opened or is not usable
    #[error("Cache tier unavailable: {0}")]
    Unavailable(String),

    /// Tier did not answer within the configured timeout
    #[error("Cache tier '{tier}' timed out after {timeout_ms}ms")]
    Timeout { tier: &'static str, timeout_ms: u64 },

    /// I/O error (for the durable tier)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}
