//! SQLite-backed cache store
//!
//! Rows live in the `cache_entries` table created by
//! [`searchcache_persistence::Database`]. Timestamps are unix milliseconds and
//! `expires_at = created_at + ttl_ms`, so staleness checks and purges are
//! plain integer comparisons.

use crate::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use searchcache_persistence::Database;
use searchcache_types::{CacheEntry, CacheKey, Result, SearchCacheError};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::{debug, warn};

/// Durable cache store on the shared SQLite database
pub struct SqliteCacheStore {
    pool: SqlitePool,
    /// Entry bound; 0 means unbounded
    max_entries: u64,
}

impl SqliteCacheStore {
    /// Create an unbounded store on `database`
    #[must_use]
    pub fn new(database: &Database) -> Self {
        Self::with_max_entries(database, 0)
    }

    /// Create a store holding at most `max_entries` entries (0 = unbounded)
    #[must_use]
    pub fn with_max_entries(database: &Database, max_entries: u64) -> Self {
        Self {
            pool: database.pool().clone(),
            max_entries,
        }
    }

    fn decode(row: &SqliteRow) -> Result<CacheEntry> {
        let value_text: String = row.try_get("value").map_err(SearchCacheError::unavailable)?;
        let created_at: i64 = row
            .try_get("created_at")
            .map_err(SearchCacheError::unavailable)?;
        let accessed_at: i64 = row
            .try_get("accessed_at")
            .map_err(SearchCacheError::unavailable)?;
        let ttl_ms: i64 = row.try_get("ttl_ms").map_err(SearchCacheError::unavailable)?;
        let hit_count: i64 = row
            .try_get("hit_count")
            .map_err(SearchCacheError::unavailable)?;

        Ok(CacheEntry {
            key: CacheKey::from_hex(
                row.try_get::<String, _>("key")
                    .map_err(SearchCacheError::unavailable)?,
            ),
            query: row.try_get("query").map_err(SearchCacheError::unavailable)?,
            value: serde_json::from_str(&value_text)?,
            created_at: from_millis(created_at),
            ttl: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0)),
            accessed_at: from_millis(accessed_at),
            hit_count: u64::try_from(hit_count).unwrap_or(0),
        })
    }

    /// Delete the row for `key` only if it is still stale at `now`.
    ///
    /// A fresh row written by a concurrent `put` is left alone.
    async fn delete_stale(&self, key: &CacheKey, now: i64) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ? AND expires_at <= ?")
            .bind(key.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(SearchCacheError::unavailable)?;
        Ok(())
    }

    /// Delete the row for `key` only if it still holds `value_text`
    async fn delete_corrupt(&self, key: &CacheKey, value_text: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ? AND value = ?")
            .bind(key.as_str())
            .bind(value_text)
            .execute(&self.pool)
            .await
            .map_err(SearchCacheError::unavailable)?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT key, query, value, created_at, ttl_ms, accessed_at, hit_count
            FROM cache_entries
            WHERE key = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(SearchCacheError::unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut entry = match Self::decode(&row) {
            Ok(entry) => entry,
            Err(SearchCacheError::Json(e)) => {
                warn!(key = %key.short(), "Cached value is corrupt, dropping: {}", e);
                let value_text: String =
                    row.try_get("value").map_err(SearchCacheError::unavailable)?;
                self.delete_corrupt(key, &value_text).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        if !entry.is_fresh_at(now) {
            debug!(key = %key.short(), "Cache entry expired, removing");
            self.delete_stale(key, now.timestamp_millis()).await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE cache_entries SET hit_count = hit_count + 1, accessed_at = ? WHERE key = ?",
        )
        .bind(now.timestamp_millis())
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .map_err(SearchCacheError::unavailable)?;

        entry.accessed_at = now;
        entry.hit_count = entry.hit_count.saturating_add(1);
        Ok(Some(entry))
    }

    async fn put(&self, key: CacheKey, query: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(key, query, value, ttl);
        let value_text = serde_json::to_string(&entry.value)?;
        let now = entry.created_at.timestamp_millis();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(SearchCacheError::unavailable)?;

        sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(SearchCacheError::unavailable)?;

        if self.max_entries > 0 {
            let others: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE key != ?")
                    .bind(entry.key.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(SearchCacheError::unavailable)?;

            let max = i64::try_from(self.max_entries).unwrap_or(i64::MAX);
            let excess = others - max + 1;
            if excess > 0 {
                debug!(count = excess, "Evicting LRU cache entries");
                sqlx::query(
                    r#"
                    DELETE FROM cache_entries WHERE key IN (
                        SELECT key FROM cache_entries
                        WHERE key != ?
                        ORDER BY accessed_at ASC
                        LIMIT ?
                    )
                    "#,
                )
                .bind(entry.key.as_str())
                .bind(excess)
                .execute(&mut *tx)
                .await
                .map_err(SearchCacheError::unavailable)?;
            }
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_entries
                (key, query, value, created_at, ttl_ms, expires_at, accessed_at, hit_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(entry.key.as_str())
        .bind(&entry.query)
        .bind(value_text)
        .bind(now)
        .bind(entry.ttl_millis())
        .bind(entry.expires_at_millis())
        .bind(entry.accessed_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(SearchCacheError::unavailable)?;

        tx.commit().await.map_err(SearchCacheError::unavailable)?;
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
            .map_err(SearchCacheError::unavailable)?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(SearchCacheError::unavailable)?;
        Ok(result.rows_affected())
    }

    async fn len(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?")
                .bind(Utc::now().timestamp_millis())
                .fetch_one(&self.pool)
                .await
                .map_err(SearchCacheError::unavailable)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
