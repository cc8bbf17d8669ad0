use crate::config::Config;
use anyhow::Result;
use searchcache_analytics::{AnalyticsRecorder, MemoryRecorder, SqliteRecorder};
use searchcache_gate::{CacheGate, GateConfig};
use searchcache_mcp::McpSearcher;
use searchcache_persistence::{Database, MEMORY_PATH};
use searchcache_store::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the gate and the resources behind it for one command run
pub struct SearchCacheService {
    gate: CacheGate,
    searcher: Arc<McpSearcher>,
    database: Option<Database>,
}

impl SearchCacheService {
    /// Wire stores, recorder and search agent from configuration
    ///
    /// `cache.path = ":memory:"` selects the process-local backends; any other
    /// path opens (or creates) a SQLite database there. A database that cannot
    /// be opened degrades to the process-local backends.
    pub async fn build(config: &Config) -> Result<Self> {
        let path = config.cache_path();
        let max_entries = config.cache.max_entries;

        let (store, recorder, database) = if path == MEMORY_PATH {
            info!("Using in-memory cache (max_entries={})", max_entries);
            memory_backends(max_entries)
        } else {
            match Database::open(&path).await {
                Ok(database) => {
                    info!("Using SQLite cache at {} (max_entries={})", path, max_entries);
                    (
                        Arc::new(SqliteCacheStore::with_max_entries(&database, max_entries))
                            as Arc<dyn CacheStore>,
                        Arc::new(SqliteRecorder::new(&database)) as Arc<dyn AnalyticsRecorder>,
                        Some(database),
                    )
                }
                Err(e) => {
                    // Searches still work; only persistence across runs is lost
                    warn!(
                        "Cache database at {} unavailable, using in-memory cache: {}",
                        path, e
                    );
                    memory_backends(max_entries)
                }
            }
        };

        let searcher = Arc::new(McpSearcher::new(config.search.clone()));

        let gate_config = GateConfig {
            default_ttl: config.default_ttl(),
            search_timeout: config.search.timeout(),
            retry: config.search.retry_policy(),
        };
        info!(
            "Gate config: ttl={:?}, search_timeout={:?}, retries={}",
            gate_config.default_ttl, gate_config.search_timeout, gate_config.retry.retries
        );

        let gate = CacheGate::new(store, recorder, searcher.clone()).with_config(gate_config);

        Ok(Self {
            gate,
            searcher,
            database,
        })
    }

    pub fn gate(&self) -> &CacheGate {
        &self.gate
    }

    /// Stop the search agent and close the database
    pub async fn shutdown(self) {
        self.searcher.shutdown().await;
        if let Some(database) = self.database {
            database.close().await;
        }
        info!("searchcache stopped");
    }
}

type Backends = (
    Arc<dyn CacheStore>,
    Arc<dyn AnalyticsRecorder>,
    Option<Database>,
);

fn memory_backends(max_entries: u64) -> Backends {
    let max_entries = usize::try_from(max_entries).unwrap_or(usize::MAX);
    (
        Arc::new(MemoryCacheStore::with_max_entries(max_entries)),
        Arc::new(MemoryRecorder::new()),
        None,
    )
}
