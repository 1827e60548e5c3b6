//! The key-value contract consumed by the vault.
//!
//! Only three operations are relied upon: point reads, point writes with an
//! optional time-to-live, and point deletes. Backends must give per-key
//! atomicity and read-after-write visibility for a single key. Nothing here
//! offers listing or transactions.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Point-access key-value storage with optional per-key expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if it is absent or
    /// has expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// When `ttl` is set the entry becomes invisible once it has elapsed.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Reject keys no backend should accept.
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument("key must not be empty".into()));
    }
    Ok(())
}
