//! End-to-end lookup scenarios on the SQLite backends

use async_trait::async_trait;
use searchcache_analytics::{AnalyticsRecorder, SqliteRecorder};
use searchcache_gate::{CacheGate, Searcher, Source};
use searchcache_persistence::Database;
use searchcache_store::{CacheStore, SqliteCacheStore};
use searchcache_types::{CacheKey, Result, SearchCacheError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns "v1", "v2", ... on successive calls, after an optional delay
struct CountingSearcher {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingSearcher {
    fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Searcher for CountingSearcher {
    async fn search(&self, _query: &str) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(json!(format!("v{call}")))
    }
}

struct Harness {
    gate: Arc<CacheGate>,
    store: Arc<SqliteCacheStore>,
    recorder: Arc<SqliteRecorder>,
    searcher: Arc<CountingSearcher>,
}

async fn harness(searcher: Arc<CountingSearcher>) -> Harness {
    let db = Database::in_memory().await.expect("open database");
    let store = Arc::new(SqliteCacheStore::new(&db));
    let recorder = Arc::new(SqliteRecorder::new(&db));
    let gate = Arc::new(CacheGate::new(store.clone(), recorder.clone(), searcher.clone()));
    Harness {
        gate,
        store,
        recorder,
        searcher,
    }
}

#[tokio::test]
async fn test_ttl_expiry_scenario() {
    let h = harness(CountingSearcher::new()).await;
    let ttl = Some(Duration::from_secs(1));

    let first = h.gate.lookup("foo", ttl).await.unwrap();
    assert_eq!(first.source, Source::Fresh);
    assert_eq!(first.value, json!("v1"));

    let second = h.gate.lookup("foo", ttl).await.unwrap();
    assert_eq!(second.source, Source::Cache);
    assert_eq!(second.value, json!("v1"));

    tokio::time::sleep(Duration::from_secs(2)).await;

    let third = h.gate.lookup("foo", ttl).await.unwrap();
    assert_eq!(third.source, Source::Fresh);
    assert_eq!(third.value, json!("v2"));
    assert_eq!(h.searcher.calls(), 2);

    let summary = h.recorder.summary(None).await.unwrap();
    assert_eq!(summary.hits, 1);
    assert_eq!(summary.misses, 2);
}

#[tokio::test]
async fn test_empty_query_touches_nothing() {
    let h = harness(CountingSearcher::new()).await;

    let err = h.gate.lookup("", None).await.unwrap_err();
    assert!(matches!(err, SearchCacheError::InvalidQuery(_)));

    let err = h.gate.lookup("   ", None).await.unwrap_err();
    assert!(matches!(err, SearchCacheError::InvalidQuery(_)));

    assert_eq!(h.searcher.calls(), 0);
    assert!(h.store.is_empty().await.unwrap());
    let summary = h.recorder.summary(None).await.unwrap();
    assert_eq!(summary.lookups() + summary.errors, 0);
}

#[tokio::test]
async fn test_search_timeout_caches_nothing() {
    let searcher = CountingSearcher::slow(Duration::from_millis(500));
    let db = Database::in_memory().await.unwrap();
    let store = Arc::new(SqliteCacheStore::new(&db));
    let recorder = Arc::new(SqliteRecorder::new(&db));
    let gate = CacheGate::new(store.clone(), recorder.clone(), searcher.clone())
        .with_search_timeout(Duration::from_millis(50));

    let err = gate.lookup("bar", None).await.unwrap_err();
    match &err {
        SearchCacheError::SearchFailed { query, reason } => {
            assert_eq!(query, "bar");
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected SearchFailed, got {other:?}"),
    }

    let key = CacheKey::for_query("bar").unwrap();
    assert!(store.get(&key).await.unwrap().is_none());
    assert!(store.is_empty().await.unwrap());

    let summary = recorder.summary(None).await.unwrap();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.hits, 0);
    assert_eq!(summary.misses, 0);
}

#[tokio::test]
async fn test_clear_forces_miss() {
    let h = harness(CountingSearcher::new()).await;

    h.gate.lookup("foo", None).await.unwrap();
    assert!(h.gate.lookup("foo", None).await.unwrap().is_hit());

    h.gate.clear_cache().await.unwrap();

    let after = h.gate.lookup("foo", None).await.unwrap();
    assert_eq!(after.source, Source::Fresh);
    assert_eq!(after.value, json!("v2"));
}

#[tokio::test]
async fn test_hit_rate_matches_recorded_outcomes() {
    let h = harness(CountingSearcher::new()).await;

    for query in ["a", "a", "a", "b", "b", "c"] {
        h.gate.lookup(query, None).await.unwrap();
    }

    let summary = h.gate.stats(None).await.unwrap();
    assert_eq!(summary.misses, 3);
    assert_eq!(summary.hits, 3);
    assert!((summary.hit_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(summary.top_queries[0].query, "a");
    assert_eq!(summary.top_queries[0].count, 3);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_entry() {
    let h = harness(CountingSearcher::new()).await;

    h.gate.lookup("shared", None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let gate = Arc::clone(&h.gate);
        handles.push(tokio::spawn(async move {
            gate.lookup("Shared", None).await.unwrap()
        }));
    }
    for handle in handles {
        let lookup = handle.await.unwrap();
        assert!(lookup.is_hit());
        assert_eq!(lookup.value, json!("v1"));
    }

    assert_eq!(h.searcher.calls(), 1);
    assert_eq!(h.gate.stats(None).await.unwrap().hits, 16);
}
