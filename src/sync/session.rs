//! Session State
//!
//! Token, identity and server mode of the running client. The token and
//! username are persisted so a restart knows whose cache it may show
//! before the first fetch completes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheResult, KeyValueStore};
use crate::model::Identity;
use crate::remote::{AuthContext, AuthResponse, SystemMode};

/// Default key of the persisted session record
pub const DEFAULT_SESSION_KEY: &str = "dashboard-session";

/// Session state of this client
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Option<String>,
    pub identity: Identity,
    pub is_admin: bool,
    pub mode: SystemMode,
    /// Random per-process id, sent with every request and push handshake
    pub session_id: String,
}

impl Session {
    /// Fresh session with nothing established yet
    pub fn new() -> Self {
        Self {
            token: None,
            identity: Identity::Unknown,
            is_admin: false,
            mode: SystemMode::default(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Session resumed from a persisted record
    pub fn restore(record: Option<StoredSession>) -> Self {
        let mut session = Self::new();
        if let Some(record) = record {
            session.token = Some(record.token);
            session.identity = Identity::User(record.username);
            session.is_admin = record.is_admin;
        }
        session
    }

    /// Adopt a successful login
    pub fn sign_in(&mut self, auth: &AuthResponse) {
        self.token = Some(auth.token.clone());
        self.identity = Identity::User(auth.username.clone());
        self.is_admin = auth.is_admin;
    }

    /// Drop token and identity; the public dashboard is shown afterwards
    pub fn sign_out(&mut self) {
        self.token = None;
        self.identity = Identity::Guest;
        self.is_admin = false;
    }

    /// Reconcile with what the server reported on a fetch.
    ///
    /// Returns true when a held token turned out to be no longer valid.
    pub fn adopt_server_view(
        &mut self,
        username: Option<String>,
        is_admin: bool,
        mode: SystemMode,
    ) -> bool {
        self.mode = mode;
        self.identity = Identity::from_username(username);
        self.is_admin = is_admin && self.identity.is_known();

        let stale_token = self.token.is_some() && self.identity.username().is_none();
        if stale_token {
            self.token = None;
        }
        stale_token
    }

    /// Whether a save would be accepted by the server. Nothing is sent
    /// before the first fetch has told us the mode.
    pub fn can_save(&self) -> bool {
        self.identity.is_known() && (self.mode == SystemMode::Single || self.token.is_some())
    }

    pub fn auth_context(&self) -> AuthContext {
        AuthContext {
            token: self.token.clone(),
            session_id: self.session_id.clone(),
        }
    }

    /// Record to persist, if signed in
    pub fn record(&self) -> Option<StoredSession> {
        Some(StoredSession {
            token: self.token.clone()?,
            username: self.identity.username()?.to_string(),
            is_admin: self.is_admin,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted form of a signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Session record storage over an injected key-value store
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            key: DEFAULT_SESSION_KEY.to_string(),
        }
    }

    /// Stored record; unreadable records count as signed out
    pub fn load(&self) -> Option<StoredSession> {
        match self.kv.get(&self.key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable session record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session record");
                None
            }
        }
    }

    /// Persist the session, or remove the record when signed out
    pub fn store(&self, session: &Session) -> CacheResult<()> {
        match session.record() {
            Some(record) => {
                let bytes = serde_json::to_vec(&record)?;
                self.kv.set(&self.key, &bytes)
            }
            None => self.kv.remove(&self.key),
        }
    }
}
