//! SearchCache Analytics
//!
//! Append-only record of gate lookups and the summaries derived from it:
//! hit / miss / error counts, hit rate, estimated tokens saved and the most
//! frequent queries within a time window.

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use searchcache_types::{AnalyticsRecord, Result, Summary};
use std::time::Duration;

pub use memory::MemoryRecorder;
pub use sqlite::SqliteRecorder;

/// Number of queries listed in a summary's top queries
pub const TOP_QUERIES: usize = 10;

/// Lookup log
///
/// Appends from concurrent callers are serialized by the backend.
#[async_trait]
pub trait AnalyticsRecorder: Send + Sync {
    /// Append one record
    async fn record(&self, record: AnalyticsRecord) -> Result<()>;

    /// Aggregate records within `window` of now, or all records when `None`
    async fn summary(&self, window: Option<Duration>) -> Result<Summary>;

    /// Drop every record, returning how many were dropped
    async fn reset(&self) -> Result<u64>;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{AnalyticsRecorder, MemoryRecorder, SqliteRecorder};
}
