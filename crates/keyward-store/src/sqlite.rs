//! SQLite-backed key-value backend.
//!
//! The [`SqliteStore`] wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and runs every statement on the blocking pool via
//! `tokio::task::spawn_blocking` so async callers never stall the runtime.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE kv (
//!     key        TEXT PRIMARY KEY,
//!     value      TEXT NOT NULL,
//!     expires_at INTEGER            -- epoch milliseconds, NULL = no expiry
//! );
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvStore, check_key};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv(expires_at);";

/// Thread-safe SQLite [`KvStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and ensure the schema exists.
    ///
    /// This call blocks briefly (file I/O), so call it during startup.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening kv database");

        let conn = Connection::open(path)?;
        Self::prepare(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory kv database");

        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Delete every expired row. Returns how many were removed.
    pub async fn purge_expired(&self) -> StoreResult<usize> {
        let now = now_millis();
        let removed = self
            .execute(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?)
            })
            .await?;
        debug!(removed, "purged expired kv rows");
        Ok(removed)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    fn prepare(conn: &Connection) -> StoreResult<()> {
        // WAL lets readers proceed while a writer holds the lock.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;
        conn.execute_batch(SCHEMA)?;
        debug!("kv schema ready");
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        check_key(key)?;
        let key = key.to_string();
        let now = now_millis();

        self.execute(move |conn| {
            let row: Option<(String, Option<i64>)> = conn
                .query_row(
                    "SELECT value, expires_at FROM kv WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((_, Some(expires_at))) if expires_at <= now => {
                    conn.execute(
                        "DELETE FROM kv WHERE key = ?1 AND expires_at <= ?2",
                        params![key, now],
                    )?;
                    Ok(None)
                }
                Some((value, _)) => Ok(Some(value)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()> {
        check_key(key)?;
        let key = key.to_string();
        let expires_at = ttl
            .map(|ttl| {
                i64::try_from(ttl.as_millis())
                    .map(|ms| now_millis().saturating_add(ms))
                    .map_err(|_| StoreError::InvalidArgument("ttl out of range".into()))
            })
            .transpose()?;

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
