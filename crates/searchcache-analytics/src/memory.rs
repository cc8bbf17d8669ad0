//! In-memory lookup log

use crate::{AnalyticsRecorder, TOP_QUERIES};
use async_trait::async_trait;
use chrono::Utc;
use searchcache_types::{AnalyticsRecord, Result, Summary};
use std::time::Duration;
use tokio::sync::Mutex;

/// Process-local lookup log
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<AnalyticsRecord>>,
}

impl MemoryRecorder {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalyticsRecorder for MemoryRecorder {
    async fn record(&self, record: AnalyticsRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn summary(&self, window: Option<Duration>) -> Result<Summary> {
        let records = self.records.lock().await;
        Ok(Summary::from_records(
            records.iter(),
            window,
            Utc::now(),
            TOP_QUERIES,
        ))
    }

    async fn reset(&self) -> Result<u64> {
        let mut records = self.records.lock().await;
        let dropped = records.len() as u64;
        records.clear();
        Ok(dropped)
    }
}
