use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A cached search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Normalized query the key was derived from
    pub query: String,
    /// Opaque search payload
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub accessed_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, query: impl Into<String>, value: Value, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            key,
            query: query.into(),
            value,
            created_at: now,
            ttl,
            accessed_at: now,
            hit_count: 0,
        }
    }

    /// TTL in milliseconds, saturating at `i64::MAX`
    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Unix millis at which the entry goes stale
    pub fn expires_at_millis(&self) -> i64 {
        self.created_at
            .timestamp_millis()
            .saturating_add(self.ttl_millis())
    }

    /// Valid iff `now - created_at < ttl`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).num_milliseconds();
        age < self.ttl_millis()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}
