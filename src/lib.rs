//! # dashsync
//!
//! Client-side state synchronization for a personal multi-user dashboard,
//! plus the deterministic grid packer that lays its widgets out.
//!
//! ## Features
//!
//! - **Local-first edits**: the local model updates synchronously and is
//!   written through to a durable cache
//! - **Debounced saves**: bursts of edits become one save; unchanged
//!   snapshots are never resent
//! - **Push reconciliation**: change notifications trigger refetches
//!   without clobbering unsaved local edits
//! - **Identity-scoped cache**: a cached dashboard is only shown to its owner
//! - **Layout packing**: first-fit placement on an occupancy grid
//!
//! ## Modules
//!
//! - [`model`]: snapshot types, widget payloads and the repair pass
//! - [`layout`]: grid placement
//! - [`cache`]: key-value stores and the snapshot cache
//! - [`remote`]: dashboard server API
//! - [`sync`]: the reconciliation engine
//! - [`push`]: WebSocket push channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dashsync::cache::MemoryStore;
//! use dashsync::model::Group;
//! use dashsync::remote::{HttpApi, HttpApiConfig};
//! use dashsync::sync::{EngineConfig, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(HttpApi::new(HttpApiConfig::default())?);
//!     let (engine, handle) =
//!         SyncEngine::new(api, Arc::new(MemoryStore::new()), EngineConfig::default());
//!     let (_events, events_rx) = tokio::sync::mpsc::channel(16);
//!     tokio::spawn(engine.run(events_rx));
//!
//!     handle.login("alice", "secret").await?;
//!     handle.update(|snapshot| snapshot.groups.push(Group::new("links", "Links")))?;
//!
//!     // Flush and stop
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod layout;
pub mod model;
pub mod push;
pub mod remote;
pub mod sync;

// Re-export top-level types for convenience
pub use cache::{CacheError, CacheResult, CacheStore, FileStore, KeyValueStore, MemoryStore};

pub use model::{Group, Identity, Item, LocalModel, Snapshot, Widget, WidgetKind, WidgetPayload};

pub use layout::{place, visible, Rect};

pub use remote::{ApiError, DashboardApi, HttpApi, HttpApiConfig, SystemMode};

pub use sync::{
    EngineConfig, RemoteEvent, SaveOutcome, SyncEngine, SyncError, SyncHandle, SyncPhase,
    SyncResult, SyncStatus,
};

pub use push::{PushClient, PushConfig, PushError};

pub use config::{Config, ConfigError, LoggingConfig};
