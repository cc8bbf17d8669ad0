//! Error types for search cache operations

use thiserror::Error;

/// Search cache errors
///
/// Cache-layer and search-layer failures are separate variants so callers and
/// analytics can tell "served from cache", "served fresh" and "failed" apart.
#[derive(Debug, Error)]
pub enum SearchCacheError {
    /// Query was empty or malformed; rejected before any cache or search work
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Storage layer could not be read or written
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// External search call errored or timed out
    #[error("Search failed for '{query}': {reason}")]
    SearchFailed {
        /// Query that was being searched
        query: String,
        /// Failure reason
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchCacheError {
    /// Build a `SearchFailed` error
    pub fn search_failed(query: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SearchFailed {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `CacheUnavailable` error from any storage error
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::CacheUnavailable(err.to_string())
    }

    /// Whether this error came from the storage layer
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable(_))
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, SearchCacheError>;
