//! SQLite-backed lookup log on the `lookups` table

use crate::{AnalyticsRecorder, TOP_QUERIES};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use searchcache_persistence::Database;
use searchcache_types::{AnalyticsRecord, Outcome, Result, SearchCacheError, Summary};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::warn;

/// Durable lookup log, so stats survive across process runs
pub struct SqliteRecorder {
    pool: SqlitePool,
}

impl SqliteRecorder {
    /// Create a recorder on `database`
    #[must_use]
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl AnalyticsRecorder for SqliteRecorder {
    async fn record(&self, record: AnalyticsRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lookups (query, outcome, timestamp, tokens_saved)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.query)
        .bind(record.outcome.as_str())
        .bind(record.timestamp.timestamp_millis())
        .bind(i64::try_from(record.tokens_saved).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(SearchCacheError::unavailable)?;

        Ok(())
    }

    async fn summary(&self, window: Option<Duration>) -> Result<Summary> {
        let now = Utc::now();
        let cutoff = window
            .and_then(|w| chrono::Duration::from_std(w).ok())
            .and_then(|w| now.checked_sub_signed(w))
            .map_or(i64::MIN, |c| c.timestamp_millis());

        let rows = sqlx::query(
            r#"
            SELECT query, outcome, timestamp, tokens_saved
            FROM lookups
            WHERE timestamp >= ?
            ORDER BY id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(SearchCacheError::unavailable)?;

        let records: Vec<AnalyticsRecord> = rows
            .iter()
            .filter_map(|row| match decode_record(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping lookup record: {}", e);
                    None
                }
            })
            .collect();

        Ok(Summary::from_records(&records, window, now, TOP_QUERIES))
    }

    async fn reset(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lookups")
            .execute(&self.pool)
            .await
            .map_err(SearchCacheError::unavailable)?;
        Ok(result.rows_affected())
    }
}

/// Decode one `lookups` row; a row written outside this recorder may not fit
fn decode_record(row: &SqliteRow) -> std::result::Result<AnalyticsRecord, String> {
    let outcome: String = row.try_get("outcome").map_err(|e| e.to_string())?;
    let outcome = outcome.parse::<Outcome>().map_err(|e| e.to_string())?;
    let timestamp: i64 = row.try_get("timestamp").map_err(|e| e.to_string())?;
    let tokens_saved: i64 = row.try_get("tokens_saved").map_err(|e| e.to_string())?;
    let query: String = row.try_get("query").map_err(|e| e.to_string())?;

    Ok(AnalyticsRecord {
        query,
        outcome,
        timestamp: DateTime::from_timestamp_millis(timestamp).unwrap_or_default(),
        tokens_saved: u64::try_from(tokens_saved).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn recorder() -> (Database, SqliteRecorder) {
        let db = Database::in_memory().await.unwrap();
        let recorder = SqliteRecorder::new(&db);
        (db, recorder)
    }

    #[tokio::test]
    async fn test_record_and_summarize() {
        let (_db, recorder) = recorder().await;
        recorder.record(AnalyticsRecord::miss("rust")).await.unwrap();
        recorder.record(AnalyticsRecord::hit("rust", 40)).await.unwrap();
        recorder.record(AnalyticsRecord::miss("zig")).await.unwrap();

        let summary = recorder.summary(None).await.unwrap();
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.misses, 2);
        assert_eq!(summary.tokens_saved, 40);
        assert_eq!(summary.top_queries.len(), 2);
        assert_eq!(summary.top_queries[0].query, "rust");
    }

    #[tokio::test]
    async fn test_window_filters_old_records() {
        let (_db, recorder) = recorder().await;
        let mut old = AnalyticsRecord::hit("old", 5);
        old.timestamp = Utc::now() - chrono::Duration::days(2);
        recorder.record(old).await.unwrap();
        recorder.record(AnalyticsRecord::miss("new")).await.unwrap();

        let day = recorder
            .summary(Some(Duration::from_secs(24 * 3600)))
            .await
            .unwrap();
        assert_eq!(day.hits, 0);
        assert_eq!(day.misses, 1);

        let all = recorder.summary(None).await.unwrap();
        assert_eq!(all.hits, 1);
        assert_eq!(all.misses, 1);
    }

    #[tokio::test]
    async fn test_unknown_outcome_rows_are_skipped() {
        let (db, recorder) = recorder().await;
        recorder.record(AnalyticsRecord::miss("rust")).await.unwrap();
        sqlx::query(
            "INSERT INTO lookups (query, outcome, timestamp, tokens_saved) VALUES ('x', 'bogus', 0, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let summary = recorder.summary(None).await.unwrap();
        assert_eq!(summary.misses, 1);
        assert_eq!(summary.top_queries.len(), 1);
    }

    #[tokio::test]
    async fn test_mistyped_rows_are_skipped() {
        let (db, recorder) = recorder().await;
        recorder.record(AnalyticsRecord::hit("rust", 7)).await.unwrap();
        for row in [
            "INSERT INTO lookups (query, outcome, timestamp, tokens_saved) VALUES ('a', 'hit', 'x', 0)",
            "INSERT INTO lookups (query, outcome, timestamp, tokens_saved) VALUES ('b', 'miss', 0, 'many')",
        ] {
            sqlx::query(row).execute(db.pool()).await.unwrap();
        }

        let summary = recorder.summary(None).await.unwrap();
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.misses, 0);
        assert_eq!(summary.tokens_saved, 7);
        assert_eq!(summary.top_queries.len(), 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let (_db, recorder) = recorder().await;
        recorder.record(AnalyticsRecord::miss("a")).await.unwrap();
        recorder.record(AnalyticsRecord::error("b")).await.unwrap();

        assert_eq!(recorder.reset().await.unwrap(), 2);
        assert_eq!(recorder.summary(None).await.unwrap().errors, 0);
    }
}
