//! Local Cache
//!
//! Durable client-side storage for the dashboard snapshot and the session
//! record.
//!
//! ## Architecture
//!
//! - **KeyValueStore**: byte store abstraction (`MemoryStore`, `FileStore`)
//! - **CacheStore**: identity-scoped snapshot cache on top of a store
//!
//! A cached snapshot is only handed out to the identity that saved it, or
//! to a session whose identity is not known yet, so a shared machine never
//! shows one user's dashboard to another.

mod error;
mod kv;
mod store;

pub use error::{CacheError, CacheResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use store::{CacheEntry, CacheStore, DEFAULT_CACHE_KEY};
