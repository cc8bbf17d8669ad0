//! Cache gate: the single entry point for cached searches

use crate::retry::RetryPolicy;
use crate::searcher::Searcher;
use searchcache_analytics::AnalyticsRecorder;
use searchcache_store::CacheStore;
use searchcache_types::{
    estimate_tokens, normalize_query, AnalyticsRecord, CacheKey, Result, SearchCacheError,
    Summary,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time-to-live for cached results (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default bound on a single search attempt
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a lookup's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fresh cache entry
    Cache,
    /// External search
    Fresh,
}

impl Source {
    /// Lowercase label used in command output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Fresh => "fresh",
        }
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone)]
pub struct Lookup {
    /// Search payload
    pub value: Value,
    /// Where `value` came from
    pub source: Source,
    /// Key the query mapped to
    pub key: CacheKey,
    /// Set when the store failed and the lookup degraded to an uncached search
    pub cache_warning: Option<String>,
}

impl Lookup {
    /// Whether the value was served from cache
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.source == Source::Cache
    }
}

/// Gate tuning
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// TTL used when a lookup gives no override
    pub default_ttl: Duration,
    /// Bound on each search attempt
    pub search_timeout: Duration,
    /// Retry behaviour for failed or timed-out attempts
    pub retry: RetryPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }
}

/// Wraps an external search with a TTL cache and lookup analytics
///
/// Constructed explicitly and shared via `Arc`; safe to call concurrently.
pub struct CacheGate {
    store: Arc<dyn CacheStore>,
    recorder: Arc<dyn AnalyticsRecorder>,
    searcher: Arc<dyn Searcher>,
    config: GateConfig,
}

impl CacheGate {
    /// Create a gate with default configuration
    pub fn new(
        store: Arc<dyn CacheStore>,
        recorder: Arc<dyn AnalyticsRecorder>,
        searcher: Arc<dyn Searcher>,
    ) -> Self {
        Self {
            store,
            recorder,
            searcher,
            config: GateConfig::default(),
        }
    }

    /// Replace the whole configuration
    #[must_use]
    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default TTL
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Set the per-attempt search timeout
    #[must_use]
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.config.search_timeout = timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Look up `query`, serving from cache when fresh and searching otherwise.
    ///
    /// # Errors
    /// `InvalidQuery` for empty or malformed queries (nothing is touched),
    /// `SearchFailed` when the search errors or times out (nothing is cached).
    /// Store failures never fail a lookup; they are reported on
    /// [`Lookup::cache_warning`].
    pub async fn lookup(&self, query: &str, ttl: Option<Duration>) -> Result<Lookup> {
        let normalized = normalize_query(query)?;
        let key = CacheKey::from_normalized(&normalized);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut cache_warning = None;

        match self.store.get(&key).await {
            Ok(Some(entry)) => {
                let tokens_saved = estimate_tokens(&entry.value);
                info!(key = %key.short(), hits = entry.hit_count, "Cache hit");
                self.record(AnalyticsRecord::hit(query, tokens_saved)).await;
                return Ok(Lookup {
                    value: entry.value,
                    source: Source::Cache,
                    key,
                    cache_warning: None,
                });
            }
            Ok(None) => {
                debug!(key = %key.short(), "Cache miss");
            }
            Err(e) => {
                warn!(key = %key.short(), "Cache read failed, searching uncached: {}", e);
                cache_warning = Some(e.to_string());
            }
        }

        let value = match self.search_with_retry(query.trim()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key.short(), "Search failed: {}", e);
                self.record(AnalyticsRecord::error(query)).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .store
            .put(key.clone(), &normalized, value.clone(), ttl)
            .await
        {
            warn!(key = %key.short(), "Cache write failed: {}", e);
            cache_warning.get_or_insert_with(|| e.to_string());
        }

        info!(key = %key.short(), ttl_secs = ttl.as_secs(), "Served fresh search result");
        self.record(AnalyticsRecord::miss(query)).await;

        Ok(Lookup {
            value,
            source: Source::Fresh,
            key,
            cache_warning,
        })
    }

    /// Lookup summary within `window` of now (all history when `None`)
    pub async fn stats(&self, window: Option<Duration>) -> Result<Summary> {
        self.recorder.summary(window).await
    }

    /// Number of fresh cache entries
    pub async fn entry_count(&self) -> Result<u64> {
        self.store.len().await
    }

    /// Drop every cached entry
    pub async fn clear_cache(&self) -> Result<u64> {
        let removed = self.store.clear().await?;
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Drop every lookup record
    pub async fn reset_stats(&self) -> Result<u64> {
        let removed = self.recorder.reset().await?;
        info!("Reset {} lookup records", removed);
        Ok(removed)
    }

    /// Drop stale cache entries
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.purge_expired().await?;
        info!("Purged {} expired cache entries", removed);
        Ok(removed)
    }

    async fn search_with_retry(&self, query: &str) -> Result<Value> {
        let timeout = self.config.search_timeout;
        let mut attempt = 0;

        loop {
            let error = match tokio::time::timeout(timeout, self.searcher.search(query)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => as_search_failed(query, e),
                Err(_) => {
                    SearchCacheError::search_failed(query, format!("timed out after {:?}", timeout))
                }
            };

            if attempt >= self.config.retry.retries {
                return Err(error);
            }

            let delay = self.config.retry.delay(attempt);
            warn!(
                attempt = attempt + 1,
                retries = self.config.retry.retries,
                "{}; retrying in {:?}",
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn record(&self, record: AnalyticsRecord) {
        let outcome = record.outcome;
        if let Err(e) = self.recorder.record(record).await {
            warn!(%outcome, "Failed to record lookup: {}", e);
        }
    }
}

fn as_search_failed(query: &str, error: SearchCacheError) -> SearchCacheError {
    match error {
        SearchCacheError::SearchFailed { .. } => error,
        other => SearchCacheError::search_failed(query, other),
    }
}
