use searchcache_types::{Result, SearchCacheError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Path value that selects an in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared SQLite database backing the cache store and the lookup log
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database instead.
    pub async fn open(path: &str) -> Result<Self> {
        if path == MEMORY_PATH {
            return Self::in_memory().await;
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(SearchCacheError::unavailable)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(SearchCacheError::unavailable)?;

        let database = Self { pool };
        database.run_migrations().await?;

        info!("Cache database initialized: {}", path);
        Ok(database)
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` gets its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(SearchCacheError::unavailable)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(SearchCacheError::unavailable)?;

        let database = Self { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    /// Connection pool, for the store and recorder backends
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                ttl_ms INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                accessed_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
            CREATE INDEX IF NOT EXISTS idx_cache_entries_accessed_at ON cache_entries(accessed_at);

            CREATE TABLE IF NOT EXISTS lookups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                outcome TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                tokens_saved INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_lookups_timestamp ON lookups(timestamp);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(SearchCacheError::unavailable)?;

        info!("Database migrations completed");
        Ok(())
    }
}
