//! In-process key-value backend.
//!
//! Entries live in a [`DashMap`] so concurrent operations on different keys
//! never contend on a global lock. Expiry is lazy: an expired entry is
//! treated as absent by [`KvStore::get`] and dropped on that access, and
//! [`MemoryStore::purge_expired`] sweeps the whole map on demand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvStore, check_key};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Concurrent in-memory [`KvStore`].
///
/// Cloning is cheap and clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including ones that have expired
    /// but not yet been swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        debug!(removed, "purged expired memory entries");
        removed
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        check_key(key)?;
        let now = Instant::now();

        // Drop the read guard before removing, otherwise the shard deadlocks.
        let found = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match found {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()> {
        check_key(key)?;
        let expires_at = ttl
            .map(|ttl| {
                Instant::now()
                    .checked_add(ttl)
                    .ok_or_else(|| StoreError::InvalidArgument("ttl out of range".into()))
            })
            .transpose()?;
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStore::new();

        store.put("oauth_tokens:aa", "one".into(), None).await.unwrap();
        assert_eq!(
            store.get("oauth_tokens:aa").await.unwrap().as_deref(),
            Some("one")
        );

        store.delete("oauth_tokens:aa").await.unwrap();
        assert!(store.get("oauth_tokens:aa").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryStore::new();
        store.put("k", "first".into(), None).await.unwrap();
        store.put("k", "second".into(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.delete("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn expired_entry_is_invisible_and_dropped() {
        let store = MemoryStore::new();
        store
            .put("csrf:t", "ticket".into(), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.get("csrf:t").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("csrf:t").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let store = MemoryStore::new();
        store
            .put("short", "a".into(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        store.put("forever", "b".into(), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.put("k", "v".into(), None).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let store = MemoryStore::new();
        let result = store.put("", "v".into(), None).await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn oversized_ttl_rejected() {
        let store = MemoryStore::new();
        let result = store
            .put("k", "v".into(), Some(Duration::from_secs(u64::MAX)))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert!(store.is_empty());
    }
}
