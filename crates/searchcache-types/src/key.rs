//! Query normalization and content-derived cache keys

use crate::error::{Result, SearchCacheError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum normalized query length, in characters
pub const MAX_QUERY_LENGTH: usize = 2048;

/// Normalize a raw query so equivalent queries map to the same cache line.
///
/// Trims, collapses every whitespace run to a single space and lowercases.
/// Empty, overlong or control-character queries are rejected.
pub fn normalize_query(query: &str) -> Result<String> {
    if let Some(c) = query
        .chars()
        .find(|c| c.is_control() && !c.is_whitespace())
    {
        return Err(SearchCacheError::InvalidQuery(format!(
            "query contains control character {:?}",
            c
        )));
    }

    let normalized = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if normalized.is_empty() {
        return Err(SearchCacheError::InvalidQuery(
            "query is empty".to_string(),
        ));
    }

    let length = normalized.chars().count();
    if length > MAX_QUERY_LENGTH {
        return Err(SearchCacheError::InvalidQuery(format!(
            "query is {} characters, limit is {}",
            length, MAX_QUERY_LENGTH
        )));
    }

    Ok(normalized)
}

/// Cache key: lowercase hex SHA-256 of the normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an already-normalized query
    pub fn from_normalized(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(digest))
    }

    /// Normalize a raw query and derive its key
    pub fn for_query(query: &str) -> Result<Self> {
        normalize_query(query).map(|n| Self::from_normalized(&n))
    }

    /// Wrap a key read back from storage
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, for log lines
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
