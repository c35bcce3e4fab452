//! Dashboard REST API Client
//!
//! HTTP client for the endpoints the sync engine consumes.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::dto::{AuthContext, AuthResponse, Credentials, DataResponse, SaveRequest};
use super::error::ApiError;

/// Header carrying the client session id
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Server operations the sync engine depends on
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Full snapshot plus identity and system mode (`GET /api/data`)
    async fn fetch_data(&self, auth: &AuthContext) -> Result<DataResponse, ApiError>;

    /// Persist a snapshot (`POST /api/save`)
    async fn save(&self, auth: &AuthContext, request: &SaveRequest) -> Result<(), ApiError>;

    /// Exchange credentials for a session token (`POST /api/login`)
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Create an account and sign in (`POST /api/register`)
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Base URL of the dashboard server (e.g., "http://localhost:3000")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// `reqwest`-backed [`DashboardApi`]
pub struct HttpApi {
    client: Client,
    config: HttpApiConfig,
}

impl HttpApi {
    pub fn new(config: HttpApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder, auth: &AuthContext) -> RequestBuilder {
        let request = request.header(SESSION_HEADER, &auth.session_id);
        match &auth.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(ApiError::from_send)?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response.json().await.map_err(ApiError::Request)
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn fetch_data(&self, auth: &AuthContext) -> Result<DataResponse, ApiError> {
        let request = self.authorize(self.client.get(self.url("/api/data")), auth);
        let data: DataResponse = self.send_json(request).await?;

        tracing::debug!(
            username = ?data.username,
            widgets = data.snapshot.widgets.len(),
            groups = data.snapshot.groups.len(),
            "Fetched dashboard data"
        );
        Ok(data)
    }

    async fn save(&self, auth: &AuthContext, request: &SaveRequest) -> Result<(), ApiError> {
        let builder = self
            .authorize(self.client.post(self.url("/api/save")), auth)
            .json(request);
        self.send(builder).await?;
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = self.client.post(self.url("/api/login")).json(credentials);
        self.send_json(request).await
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = self.client.post(self.url("/api/register")).json(credentials);
        self.send_json(request).await
    }
}
