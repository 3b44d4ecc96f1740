//! Error types for cache operations.

use std::time::Duration;

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache tier could not serve the request.
    #[error("Cache tier unavailable: {0}")]
    Unavailable(String),

    /// A cache tier did not answer in time.
    #[error("Cache tier timed out after {0:?}")]
    Timeout(Duration),

    /// A key pattern was not a valid regular expression.
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Persisted state could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing persisted state failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("Internal cache error: {0}")]
    Internal(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
