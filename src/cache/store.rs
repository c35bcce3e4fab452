//! Snapshot Cache
//!
//! Durable copy of the last known snapshot, tagged with the identity that
//! owns it. Read at cold start to render before the first fetch returns;
//! written through on every successful fetch and save.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::CacheResult;
use super::kv::KeyValueStore;
use crate::model::{Identity, Snapshot};

/// Default key of the snapshot cache entry
pub const DEFAULT_CACHE_KEY: &str = "dashboard-cache";

/// A cached snapshot with its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub snapshot: Snapshot,
    /// Username of the owner; `None` for the public dashboard
    pub owner: Option<String>,
    /// Milliseconds since the Unix epoch
    pub saved_at: i64,
}

/// Identity-scoped snapshot cache over an injected key-value store
#[derive(Clone)]
pub struct CacheStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, DEFAULT_CACHE_KEY)
    }

    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Store `snapshot` as owned by `identity`.
    ///
    /// Nothing is written while the identity is still unknown, since the
    /// entry could not be attributed to anyone.
    pub fn save(&self, snapshot: &Snapshot, identity: &Identity) -> CacheResult<()> {
        if !identity.is_known() {
            tracing::debug!("Skipping cache write for unknown identity");
            return Ok(());
        }

        let entry = CacheEntry {
            snapshot: snapshot.clone(),
            owner: identity.username().map(str::to_string),
            saved_at: Utc::now().timestamp_millis(),
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.kv.set(&self.key, &bytes)?;

        tracing::trace!(owner = %identity, bytes = bytes.len(), "Snapshot cached");
        Ok(())
    }

    /// Cached snapshot readable by `identity`, if any.
    ///
    /// Entries owned by someone else, unreadable entries and store failures
    /// all count as a miss.
    pub fn load(&self, identity: &Identity) -> Option<Snapshot> {
        self.load_entry(identity).map(|entry| entry.snapshot)
    }

    /// Like [`CacheStore::load`], keeping the entry metadata
    pub fn load_entry(&self, identity: &Identity) -> Option<CacheEntry> {
        let entry = self.peek()?;
        if identity.may_read(entry.owner.as_deref()) {
            Some(entry)
        } else {
            tracing::debug!(
                requested = %identity,
                owner = ?entry.owner,
                "Cached snapshot belongs to another identity"
            );
            None
        }
    }

    /// Stored entry regardless of owner, for diagnostics
    pub fn peek(&self) -> Option<CacheEntry> {
        let bytes = match self.kv.get(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot cache");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable snapshot cache");
                None
            }
        }
    }

    /// Drop the cached entry
    pub fn clear(&self) -> CacheResult<()> {
        self.kv.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv::MemoryStore;
    use crate::model::Group;

    fn store() -> (Arc<MemoryStore>, CacheStore) {
        let kv = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(kv.clone());
        (kv, cache)
    }

    fn snapshot_with_group(title: &str) -> Snapshot {
        Snapshot {
            groups: vec![Group::new("g", title)],
            ..Default::default()
        }
    }

    fn user(name: &str) -> Identity {
        Identity::User(name.to_string())
    }

    #[test]
    fn test_identity_isolation() {
        let (_, cache) = store();
        cache.save(&snapshot_with_group("Bob's"), &user("bob")).unwrap();

        assert_eq!(cache.load(&user("alice")), None);
        assert_eq!(cache.load(&Identity::Guest), None);
        assert_eq!(cache.load(&user("bob")), Some(snapshot_with_group("Bob's")));
    }

    #[test]
    fn test_unknown_identity_reads_anything() {
        let (_, cache) = store();
        cache.save(&snapshot_with_group("Bob's"), &user("bob")).unwrap();

        let entry = cache.load_entry(&Identity::Unknown).unwrap();
        assert_eq!(entry.owner.as_deref(), Some("bob"));
        assert!(entry.saved_at > 0);
    }

    #[test]
    fn test_guest_entry() {
        let (_, cache) = store();
        cache.save(&snapshot_with_group("Public"), &Identity::Guest).unwrap();

        assert!(cache.load(&Identity::Guest).is_some());
        assert!(cache.load(&user("alice")).is_none());
    }

    #[test]
    fn test_unknown_identity_is_not_written() {
        let (kv, cache) = store();
        cache.save(&Snapshot::default(), &Identity::Unknown).unwrap();
        assert_eq!(kv.get(DEFAULT_CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn test_newer_save_overwrites() {
        let (_, cache) = store();
        cache.save(&snapshot_with_group("old"), &user("bob")).unwrap();
        cache.save(&snapshot_with_group("new"), &user("alice")).unwrap();

        assert_eq!(cache.load(&user("bob")), None);
        assert_eq!(cache.load(&user("alice")), Some(snapshot_with_group("new")));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (kv, cache) = store();
        kv.set(DEFAULT_CACHE_KEY, b"{not json").unwrap();

        assert_eq!(cache.load(&Identity::Unknown), None);
        cache.clear().unwrap();
        assert_eq!(cache.peek(), None);
    }
}
