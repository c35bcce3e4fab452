//! Request/Response DTOs of the dashboard server API

use serde::{Deserialize, Serialize};

use crate::model::Snapshot;

/// Whether the server runs for a single owner or for many accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemMode {
    /// One owner, no sign-in needed to save
    #[default]
    Single,
    /// Accounts; saving requires a session token
    Multi,
}

/// Response of `GET /api/data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Signed-in user the data belongs to; absent for the public view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub mode: SystemMode,
}

/// Body of `POST /api/save`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

/// Body of `POST /api/login` and `POST /api/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Per-request authentication material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub token: Option<String>,
    /// Identifies this client session to the server and other sessions
    pub session_id: String,
}
