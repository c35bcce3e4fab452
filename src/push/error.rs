//! Push channel error types

use thiserror::Error;

/// Errors of a push connection. All of them end the current connection and
/// lead to a reconnect.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid push URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection closed by server")]
    Closed,
}
