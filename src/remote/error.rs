//! Dashboard API error types

use thiserror::Error;

/// Errors that can occur when talking to the dashboard server
#[derive(Error, Debug)]
pub enum ApiError {
    /// Session token missing, expired or rejected (HTTP 401)
    #[error("Not authorized")]
    Unauthorized,

    #[error("Dashboard server unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Classify a transport-level failure
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            ApiError::Unavailable
        } else {
            ApiError::Request(e)
        }
    }
}
