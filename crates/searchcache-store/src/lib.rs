//! SearchCache Store
//!
//! Key → entry mapping with time-to-live semantics. Stale entries are never
//! returned; they are pruned lazily on read and on the next write, or
//! explicitly through [`CacheStore::purge_expired`].
//!
//! Two backends share the [`CacheStore`] trait:
//!
//! - [`MemoryCacheStore`]: process-local map behind a tokio `RwLock`
//! - [`SqliteCacheStore`]: durable table in the shared SQLite database
//!
//! Both accept an optional entry bound; when full, the least recently
//! accessed entry is evicted to make room.

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use searchcache_types::{CacheEntry, CacheKey, Result};
use serde_json::Value;
use std::time::Duration;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

/// Storage behind the cache gate
///
/// Storage-layer failures surface as `SearchCacheError::CacheUnavailable`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fresh entry for `key`, or `None` when absent or stale.
    ///
    /// A returned entry has had its hit count and access time bumped.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite the entry for `key`, stamped with the current time
    async fn put(&self, key: CacheKey, query: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> Result<u64>;

    /// Remove stale entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;

    /// Number of fresh entries; stale rows awaiting pruning are not counted
    async fn len(&self) -> Result<u64>;

    /// Whether the store holds no fresh entries
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{CacheStore, MemoryCacheStore, SqliteCacheStore};
}
