//! Error types for the Bloom attempt limiter.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for limiter operations.
#[derive(Error, Debug)]
pub enum BloomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence collaborator errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored attempt record could not be decoded
    #[error("Malformed attempt record: {0}")]
    Record(#[source] serde_json::Error),
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, BloomError>;
