//! # keyward-store
//!
//! Key-value backends for the keyward credential vault.
//!
//! The vault needs exactly three operations from its storage: `get`, `put`
//! with an optional time-to-live, and `delete`. [`KvStore`] captures that
//! contract; [`MemoryStore`] and [`SqliteStore`] implement it.
//!
//! ```ignore
//! use keyward_store::{KvStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.put("csrf:abc", "{}".into(), Some(Duration::from_secs(600))).await?;
//! assert!(store.get("csrf:abc").await?.is_some());
//! ```

pub mod error;
pub mod kv;
pub mod memory;
pub mod sqlite;

// ── re-exports ───────────────────────────────────────────────────────

pub use error::{StoreError, StoreResult};
pub use kv::KvStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
