//! Lookup records and the summaries derived from them

use crate::key::normalize_query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Outcome of a single gate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Served from a fresh cache entry
    Hit,
    /// Served from a fresh external search
    Miss,
    /// External search failed; nothing served
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hit" => Ok(Outcome::Hit),
            "miss" => Ok(Outcome::Miss),
            "error" => Ok(Outcome::Error),
            other => Err(format!("unknown outcome '{}'", other)),
        }
    }
}

/// One recorded lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// Original query text as the caller sent it
    pub query: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// Estimated tokens a hit avoided re-fetching (0 for misses and errors)
    pub tokens_saved: u64,
}

impl AnalyticsRecord {
    pub fn new(query: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            query: query.into(),
            outcome,
            timestamp: Utc::now(),
            tokens_saved: 0,
        }
    }

    pub fn hit(query: impl Into<String>, tokens_saved: u64) -> Self {
        Self {
            tokens_saved,
            ..Self::new(query, Outcome::Hit)
        }
    }

    pub fn miss(query: impl Into<String>) -> Self {
        Self::new(query, Outcome::Miss)
    }

    pub fn error(query: impl Into<String>) -> Self {
        Self::new(query, Outcome::Error)
    }
}

/// Rough token estimate for a payload: one token per four serialized bytes
pub fn estimate_tokens(value: &Value) -> u64 {
    let bytes = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0) as u64;
    bytes.div_ceil(4)
}

/// Query frequency within a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCount {
    pub query: String,
    pub count: u64,
}

/// Aggregated lookup statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// hits / (hits + misses); 0.0 when nothing was looked up
    pub hit_rate: f64,
    pub tokens_saved: u64,
    /// Most frequent normalized queries, highest first
    pub top_queries: Vec<QueryCount>,
    /// Window the summary covers; `None` means all recorded history
    pub window: Option<Duration>,
}

impl Summary {
    /// Aggregate records whose timestamp lies within `window` of `now`
    pub fn from_records<'a, I>(
        records: I,
        window: Option<Duration>,
        now: DateTime<Utc>,
        top_n: usize,
    ) -> Self
    where
        I: IntoIterator<Item = &'a AnalyticsRecord>,
    {
        let cutoff = window
            .and_then(|w| chrono::Duration::from_std(w).ok())
            .and_then(|w| now.checked_sub_signed(w));

        let mut summary = Summary {
            window,
            ..Summary::default()
        };
        let mut frequency: HashMap<String, u64> = HashMap::new();

        for record in records {
            if let Some(cutoff) = cutoff {
                if record.timestamp < cutoff {
                    continue;
                }
            }

            match record.outcome {
                Outcome::Hit => summary.hits += 1,
                Outcome::Miss => summary.misses += 1,
                Outcome::Error => summary.errors += 1,
            }
            summary.tokens_saved += record.tokens_saved;

            let query = normalize_query(&record.query)
                .unwrap_or_else(|_| record.query.trim().to_lowercase());
            *frequency.entry(query).or_insert(0) += 1;
        }

        summary.hit_rate = hit_rate(summary.hits, summary.misses);

        let mut top: Vec<QueryCount> = frequency
            .into_iter()
            .map(|(query, count)| QueryCount { query, count })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        top.truncate(top_n);
        summary.top_queries = top;

        summary
    }

    /// Total lookups that reached a hit or miss
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
