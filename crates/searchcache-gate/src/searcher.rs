//! External search collaborator

use async_trait::async_trait;
use searchcache_types::Result;
use serde_json::Value;

/// The search call the gate sits in front of
///
/// Implementations report failures as `SearchCacheError::SearchFailed`; any
/// other error variant is wrapped into one by the gate.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Run `query` and return the raw result payload
    async fn search(&self, query: &str) -> Result<Value>;
}
