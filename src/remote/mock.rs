//! Scripted in-memory [`DashboardApi`] for engine tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::client::DashboardApi;
use super::dto::{AuthContext, AuthResponse, Credentials, DataResponse, SaveRequest, SystemMode};
use super::error::ApiError;
use crate::model::{LocalModel, Snapshot};

/// Server-side state and call log of a [`ScriptedApi`]
#[derive(Debug, Default)]
pub struct ScriptState {
    /// Data returned to requests carrying the valid token
    pub private: Snapshot,
    /// Data returned to anonymous requests
    pub public: Snapshot,
    pub username: String,
    pub password: String,
    pub token: String,
    pub mode: SystemMode,
    pub fetch_delay: Duration,
    pub save_delay: Duration,
    /// Results handed out to upcoming saves; `Ok` once exhausted
    pub save_results: VecDeque<Result<(), ApiError>>,
    pub saves: Vec<SaveRequest>,
    pub fetches: Vec<AuthContext>,
}

/// In-memory dashboard server
#[derive(Clone, Default)]
pub struct ScriptedApi {
    state: Arc<Mutex<ScriptState>>,
}

/// Snapshot as the server would hold it after a normalized save
pub fn normalized(snapshot: Snapshot) -> Snapshot {
    LocalModel::from_snapshot(snapshot).snapshot().clone()
}

impl ScriptedApi {
    /// Server for `alice` (password `secret`, token `alice-token`) in
    /// multi-user mode with normalized private and public data
    pub fn new() -> Self {
        let api = Self::default();
        {
            let mut state = api.state();
            state.private = normalized(Snapshot::default());
            state.public = normalized(Snapshot::default());
            state.username = "alice".to_string();
            state.password = "secret".to_string();
            state.token = "alice-token".to_string();
            state.mode = SystemMode::Multi;
        }
        api
    }

    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    pub fn save_count(&self) -> usize {
        self.state().saves.len()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches.len()
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let state = self.state();
        if credentials.username == state.username && credentials.password == state.password {
            Ok(AuthResponse {
                token: state.token.clone(),
                username: state.username.clone(),
                is_admin: false,
            })
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

#[async_trait]
impl DashboardApi for ScriptedApi {
    async fn fetch_data(&self, auth: &AuthContext) -> Result<DataResponse, ApiError> {
        let delay = {
            let mut state = self.state();
            state.fetches.push(auth.clone());
            state.fetch_delay
        };
        tokio::time::sleep(delay).await;

        let state = self.state();
        let signed_in = auth.token.as_deref() == Some(state.token.as_str());
        Ok(DataResponse {
            snapshot: if signed_in {
                state.private.clone()
            } else {
                state.public.clone()
            },
            username: signed_in.then(|| state.username.clone()),
            is_admin: false,
            mode: state.mode,
        })
    }

    async fn save(&self, auth: &AuthContext, request: &SaveRequest) -> Result<(), ApiError> {
        let delay = self.state().save_delay;
        tokio::time::sleep(delay).await;

        let mut state = self.state();
        state.saves.push(request.clone());
        let result = state.save_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            if auth.token.as_deref() == Some(state.token.as_str()) {
                state.private = request.snapshot.clone();
            } else {
                state.public = request.snapshot.clone();
            }
        }
        result
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.authenticate(credentials)
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        {
            let mut state = self.state();
            state.username = credentials.username.clone();
            state.password = credentials.password.clone();
        }
        self.authenticate(credentials)
    }
}
