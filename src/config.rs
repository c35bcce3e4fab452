//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `DASHSYNC_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::push::{push_url, PushConfig, PushError};
use crate::remote::HttpApiConfig;
use crate::sync::{EngineConfig, DEFAULT_PRIVILEGED_IDENTITY};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard server endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_push_path")]
    pub push_path: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_push_path() -> String {
    "/api/ws".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            push_path: default_push_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Save scheduling and push reconciliation
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default = "default_privileged_identity")]
    pub privileged_identity: String,

    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,
}

fn default_debounce() -> u64 {
    500
}

fn default_privileged_identity() -> String {
    DEFAULT_PRIVILEGED_IDENTITY.to_string()
}

fn default_reconnect_max_delay() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            privileged_identity: default_privileged_identity(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
        }
    }
}

/// Local snapshot and session storage
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

fn default_cache_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("dashsync").to_string_lossy().to_string())
        .unwrap_or_else(|| "./dashsync_data".to_string())
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~/` expanded
    pub fn path(&self) -> PathBuf {
        match self.dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.dir)),
            None => PathBuf::from(&self.dir),
        }
    }
}

/// Grid dimensions
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_columns")]
    pub columns: u32,

    #[serde(default = "default_mobile_columns")]
    pub mobile_columns: u32,
}

fn default_columns() -> u32 {
    4
}

fn default_mobile_columns() -> u32 {
    2
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            mobile_columns: default_mobile_columns(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("dashsync").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DASHSYNC_SERVER_URL") {
            self.server.base_url = url;
        }
        if let Ok(secs) = std::env::var("DASHSYNC_REQUEST_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.server.request_timeout_secs = secs;
            }
        }

        if let Ok(ms) = std::env::var("DASHSYNC_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse() {
                self.sync.debounce_ms = ms;
            }
        }
        if let Ok(identity) = std::env::var("DASHSYNC_PRIVILEGED_IDENTITY") {
            self.sync.privileged_identity = identity;
        }

        if let Ok(dir) = std::env::var("DASHSYNC_CACHE_DIR") {
            self.cache.dir = dir;
        }

        if let Ok(level) = std::env::var("DASHSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DASHSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn api_config(&self) -> HttpApiConfig {
        HttpApiConfig {
            base_url: self.server.base_url.clone(),
            request_timeout_ms: self.server.request_timeout_secs.saturating_mul(1000),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: Duration::from_millis(self.sync.debounce_ms),
            privileged_identity: self.sync.privileged_identity.clone(),
        }
    }

    pub fn push_config(&self) -> Result<PushConfig, PushError> {
        Ok(PushConfig {
            url: push_url(&self.server.base_url, &self.server.push_path)?,
            max_backoff: Duration::from_millis(self.sync.reconnect_max_delay_ms),
            ..Default::default()
        })
    }

    /// Column count for the desktop or mobile grid
    pub fn columns(&self, mobile: bool) -> u32 {
        if mobile {
            self.layout.mobile_columns
        } else {
            self.layout.columns
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# dashsync Configuration
#
# Environment variables override these settings:
# - DASHSYNC_SERVER_URL
# - DASHSYNC_REQUEST_TIMEOUT
# - DASHSYNC_DEBOUNCE_MS
# - DASHSYNC_PRIVILEGED_IDENTITY
# - DASHSYNC_CACHE_DIR
# - DASHSYNC_LOG_LEVEL
# - DASHSYNC_LOG_FORMAT

[server]
# Dashboard server base URL
base_url = "http://localhost:3000"

# Path of the push (WebSocket) endpoint
push_path = "/api/ws"

# Request timeout in seconds
request_timeout_secs = 10

[sync]
# Quiet period after the last edit before saving (ms)
debounce_ms = 500

# Changes by this user are refetched by every session
privileged_identity = "admin"

# Upper bound of the push reconnect delay (ms)
reconnect_max_delay_ms = 30000

[cache]
# Directory for the cached snapshot and session
dir = "~/.local/share/dashsync"

[layout]
# Grid columns on desktop and on mobile
columns = 4
mobile_columns = 2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
