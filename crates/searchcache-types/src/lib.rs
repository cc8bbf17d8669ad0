//! SearchCache Types - Core types shared by the cache, analytics and gate crates
//!
//! This module defines the data model used throughout the workspace: cache keys
//! derived from normalized queries, cache entries with a time-to-live, lookup
//! records and their aggregated summaries, and the common error type.

pub mod error;
pub mod key;
pub mod record;

mod entry;

pub use entry::CacheEntry;
pub use error::{Result, SearchCacheError};
pub use key::{normalize_query, CacheKey, MAX_QUERY_LENGTH};
pub use record::{estimate_tokens, AnalyticsRecord, Outcome, QueryCount, Summary};
