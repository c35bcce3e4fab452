//! Push Channel
//!
//! Real-time change notifications from the dashboard server.
//!
//! ## Protocol
//!
//! The client connects to `/api/ws` and announces itself:
//! - `{"type": "auth", "token": ..., "sessionId": ...}` on connect and on
//!   every token change
//! - `{"type": "ping"}` as keepalive
//!
//! The server sends `data_changed`, `mode_changed`, `widget_data` and
//! `pong`. Unknown message types are ignored.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dashsync::push::{push_url, PushClient, PushConfig};
//! use tokio::sync::{mpsc, watch};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PushConfig {
//!     url: push_url("http://localhost:3000", "/api/ws")?,
//!     ..Default::default()
//! };
//! let (_token_tx, token) = watch::channel(None);
//! let (events, mut rx) = mpsc::channel(64);
//! tokio::spawn(PushClient::new(config, "session-1", token, events).run());
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod messages;

pub use client::{push_url, PushClient, PushConfig};
pub use error::PushError;
pub use messages::{ClientPush, ServerPush};
