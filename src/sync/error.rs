//! Sync engine error types

use thiserror::Error;

use crate::cache::CacheError;
use crate::remote::ApiError;

/// Errors surfaced to callers of explicit sync operations.
///
/// Ambient failures (debounced saves, notification refetches) are logged
/// by the engine and never reach a caller. The error is `Clone` because one
/// save outcome may settle several waiting callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The server rejected the session; local identity has been cleared
    #[error("Authentication expired or rejected")]
    Unauthorized,

    /// Saving requires a signed-in user in multi-user mode
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Sync engine stopped")]
    EngineStopped,
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SyncError::Unauthorized,
            other => SyncError::Request(other.to_string()),
        }
    }
}

impl From<CacheError> for SyncError {
    fn from(err: CacheError) -> Self {
        SyncError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
