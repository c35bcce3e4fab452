//! Sync Engine
//!
//! Keeps the local dashboard snapshot, the local cache and the server in
//! agreement.
//!
//! ## Architecture
//!
//! - **SyncEngine**: single task owning model, cache, session and scheduler
//! - **SyncHandle**: cloneable command front end for UI code and the CLI
//! - **PersistenceScheduler**: debounce and dedup of saves, no I/O
//! - **RemoteChangeChannel**: classification of push events
//!
//! ## Data Flow
//!
//! 1. An edit lands in the local model and is written through to the cache
//! 2. The scheduler arms a trailing debounce and sends one save per burst
//! 3. Change notifications arriving while a save is pending are dropped
//! 4. Other notifications, reconnects and logins trigger a full refetch

mod channel;
mod engine;
mod error;
mod scheduler;
mod session;

pub use channel::{
    ChangeNotification, FetchReason, IgnoreReason, Reaction, RemoteChangeChannel, RemoteEvent,
    DEFAULT_PRIVILEGED_IDENTITY,
};
pub use engine::{EngineConfig, SaveOutcome, SyncEngine, SyncHandle, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use scheduler::{PendingSave, PersistenceScheduler, SaveDecision, SyncPhase, DEFAULT_DEBOUNCE};
pub use session::{Session, SessionStore, StoredSession, DEFAULT_SESSION_KEY};
