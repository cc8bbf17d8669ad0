//! In-memory cache store

use crate::CacheStore;
use async_trait::async_trait;
use chrono::Utc;
use searchcache_types::{CacheEntry, CacheKey, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local cache store
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Entry bound; 0 means unbounded
    max_entries: usize,
}

impl MemoryCacheStore {
    /// Create an unbounded store
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(0)
    }

    /// Create a store holding at most `max_entries` entries (0 = unbounded)
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    fn evict_lru(entries: &mut HashMap<CacheKey, CacheEntry>) {
        if let Some(lru_key) = entries
            .iter()
            .min_by_key(|(_, e)| e.accessed_at)
            .map(|(k, _)| k.clone())
        {
            debug!(key = %lru_key.short(), "Evicting LRU cache entry");
            entries.remove(&lru_key);
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        let fresh = match entries.get(key) {
            Some(entry) => entry.is_fresh_at(now),
            None => return Ok(None),
        };

        if !fresh {
            debug!(key = %key.short(), "Cache entry expired, removing");
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get_mut(key).map(|entry| {
            entry.accessed_at = now;
            entry.hit_count = entry.hit_count.saturating_add(1);
            entry.clone()
        }))
    }

    async fn put(&self, key: CacheKey, query: &str, value: Value, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        entries.retain(|_, e| e.is_fresh_at(now));

        if self.max_entries > 0 {
            while !entries.contains_key(&key) && entries.len() >= self.max_entries {
                Self::evict_lru(&mut entries);
            }
        }

        let entry = CacheEntry::new(key.clone(), query, value, ttl);
        entries.insert(key, entry);
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_fresh_at(now));
        Ok((before - entries.len()) as u64)
    }

    async fn len(&self) -> Result<u64> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| e.is_fresh_at(now)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(query: &str) -> CacheKey {
        CacheKey::from_normalized(query)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryCacheStore::new();
        store
            .put(key("foo"), "foo", json!("v1"), Duration::from_secs(60))
            .await
            .unwrap();

        let entry = store.get(&key("foo")).await.unwrap().unwrap();
        assert_eq!(entry.value, json!("v1"));
        assert_eq!(entry.query, "foo");
        assert_eq!(entry.hit_count, 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryCacheStore::new();
        assert!(store.get(&key("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_is_pruned_on_read() {
        let store = MemoryCacheStore::new();
        store
            .put(key("foo"), "foo", json!("v1"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 0);

        assert!(store.get(&key("foo")).await.unwrap().is_none());
        // Already removed by the read
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        store.put(key("foo"), "foo", json!("v1"), ttl).await.unwrap();
        store.put(key("foo"), "foo", json!("v2"), ttl).await.unwrap();

        let entry = store.get(&key("foo")).await.unwrap().unwrap();
        assert_eq!(entry.value, json!("v2"));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        store.put(key("a"), "a", json!(1), ttl).await.unwrap();
        store.put(key("b"), "b", json!(2), ttl).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.is_empty().await.unwrap());
        assert!(store.get(&key("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_fresh() {
        let store = MemoryCacheStore::new();
        store
            .put(key("new"), "new", json!(2), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put(key("old"), "old", json!(1), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get(&key("new")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction_when_bounded() {
        let store = MemoryCacheStore::with_max_entries(2);
        let ttl = Duration::from_secs(60);
        store.put(key("a"), "a", json!(1), ttl).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.put(key("b"), "b", json!(2), ttl).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Touch "a" so "b" becomes least recently used
        assert!(store.get(&key("a")).await.unwrap().is_some());
        store.put(key("c"), "c", json!(3), ttl).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.get(&key("a")).await.unwrap().is_some());
        assert!(store.get(&key("b")).await.unwrap().is_none());
        assert!(store.get(&key("c")).await.unwrap().is_some());
    }
}
