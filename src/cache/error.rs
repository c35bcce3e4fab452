//! Cache error types

use thiserror::Error;

/// Errors from the local key-value cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key cannot be mapped onto the backing store
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
