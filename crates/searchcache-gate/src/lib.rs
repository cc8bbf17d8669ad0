//! SearchCache Gate
//!
//! Single entry point for cached web searches. A lookup validates and
//! normalizes the query, derives its content key, and then:
//!
//! - on a fresh cache entry, returns it and records a hit
//! - otherwise, runs the external search (bounded by a timeout, optionally
//!   retried with exponential backoff), stores the result with its TTL,
//!   records a miss and returns it
//! - when the search fails, records an error and returns `SearchFailed`
//!
//! Storage failures degrade to uncached searches instead of failing callers.

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod gate;
pub mod retry;
pub mod searcher;

pub use gate::{CacheGate, GateConfig, Lookup, Source, DEFAULT_SEARCH_TIMEOUT, DEFAULT_TTL};
pub use retry::RetryPolicy;
pub use searcher::Searcher;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{CacheGate, GateConfig, Lookup, RetryPolicy, Searcher, Source};
}
