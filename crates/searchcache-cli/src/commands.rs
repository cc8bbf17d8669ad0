//! Command handlers. Each returns the text to print on stdout.

use crate::cli::{ClearArgs, Command};
use anyhow::{Context, Result};
use searchcache_gate::{CacheGate, Lookup};
use searchcache_types::Summary;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

pub(crate) async fn run(command: Command, gate: &CacheGate) -> Result<String> {
    match command {
        Command::Search { query, ttl, json } => {
            cmd_search(gate, &query.join(" "), ttl.map(Duration::from_secs), json).await
        }
        Command::Stats { window } => cmd_stats(gate, window.map(Duration::from_secs)).await,
        Command::Clear(args) => cmd_clear(gate, &args).await,
        Command::Purge => cmd_purge(gate).await,
    }
}

async fn cmd_search(
    gate: &CacheGate,
    query: &str,
    ttl: Option<Duration>,
    as_json: bool,
) -> Result<String> {
    let lookup = gate.lookup(query, ttl).await?;

    if let Some(warning) = &lookup.cache_warning {
        eprintln!("warning: cache unavailable, result not cached: {warning}");
    }

    if as_json {
        return render_lookup_json(query, &lookup);
    }

    eprintln!("[{} {}]", lookup.source.as_str(), lookup.key.short());
    match &lookup.value {
        serde_json::Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string_pretty(other).context("Failed to render search result"),
    }
}

fn render_lookup_json(query: &str, lookup: &Lookup) -> Result<String> {
    let document = json!({
        "query": query,
        "key": lookup.key,
        "source": lookup.source.as_str(),
        "cache_warning": lookup.cache_warning,
        "value": lookup.value,
    });
    serde_json::to_string_pretty(&document).context("Failed to render lookup")
}

async fn cmd_stats(gate: &CacheGate, window: Option<Duration>) -> Result<String> {
    let summary = gate.stats(window).await?;
    let entries = gate.entry_count().await?;
    Ok(render_summary(&summary, entries))
}

fn render_summary(summary: &Summary, entries: u64) -> String {
    let mut out = String::new();

    let scope = match summary.window {
        Some(window) => format!("last {}s", window.as_secs()),
        None => "all time".to_string(),
    };
    let _ = writeln!(out, "Lookups ({scope}): {}", summary.lookups());
    let _ = writeln!(out, "  {:<14} {}", "Hits", summary.hits);
    let _ = writeln!(out, "  {:<14} {}", "Misses", summary.misses);
    let _ = writeln!(out, "  {:<14} {}", "Errors", summary.errors);
    let _ = writeln!(out, "  {:<14} {:.1}%", "Hit rate", summary.hit_rate * 100.0);
    let _ = writeln!(out, "  {:<14} {}", "Tokens saved", summary.tokens_saved);
    let _ = writeln!(out, "  {:<14} {}", "Cached entries", entries);

    if summary.top_queries.is_empty() {
        out.push_str("\nNo lookups recorded.");
        return out;
    }

    let _ = writeln!(out, "\n{:<8} {}", "Count", "Query");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for entry in &summary.top_queries {
        let _ = writeln!(out, "{:<8} {}", entry.count, entry.query);
    }

    out.trim_end().to_string()
}

async fn cmd_clear(gate: &CacheGate, args: &ClearArgs) -> Result<String> {
    let mut lines = Vec::new();

    if !args.stats {
        let removed = gate.clear_cache().await?;
        lines.push(format!("Removed {removed} cached entries."));
    }
    if args.stats || args.all {
        let removed = gate.reset_stats().await?;
        lines.push(format!("Removed {removed} lookup records."));
    }

    Ok(lines.join("\n"))
}

async fn cmd_purge(gate: &CacheGate) -> Result<String> {
    let removed = gate.purge_expired().await?;
    Ok(format!("Purged {removed} expired entries."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use searchcache_analytics::MemoryRecorder;
    use searchcache_gate::Searcher;
    use searchcache_store::MemoryCacheStore;
    use searchcache_types::SearchCacheError;
    use serde_json::Value;
    use std::sync::Arc;

    struct EchoSearcher;

    #[async_trait]
    impl Searcher for EchoSearcher {
        async fn search(&self, query: &str) -> searchcache_types::Result<Value> {
            Ok(json!({ "results": [query] }))
        }
    }

    fn gate() -> CacheGate {
        CacheGate::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(MemoryRecorder::new()),
            Arc::new(EchoSearcher),
        )
    }

    fn search(words: &[&str], json: bool) -> Command {
        Command::Search {
            query: words.iter().map(|w| (*w).to_string()).collect(),
            ttl: None,
            json,
        }
    }

    #[tokio::test]
    async fn test_search_then_hit_json() {
        let gate = gate();

        let first = run(search(&["Rust", "Cache"], true), &gate).await.unwrap();
        let first: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first["source"], "fresh");
        assert_eq!(first["query"], "Rust Cache");
        assert_eq!(first["value"], json!({ "results": ["Rust Cache"] }));

        let second = run(search(&["rust", "cache"], true), &gate).await.unwrap();
        let second: Value = serde_json::from_str(&second).unwrap();
        assert_eq!(second["source"], "cache");
        assert_eq!(second["key"], first["key"]);
        assert_eq!(second["value"], first["value"]);
    }

    #[tokio::test]
    async fn test_search_plain_output() {
        let gate = gate();
        let out = run(search(&["tokio"], false), &gate).await.unwrap();
        assert!(out.contains("\"results\""));
        assert!(out.contains("tokio"));
    }

    #[tokio::test]
    async fn test_blank_query_is_error() {
        let gate = gate();
        let err = run(search(&["  "], false), &gate).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SearchCacheError>(),
            Some(SearchCacheError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_report() {
        let gate = gate();
        for words in [["a"], ["a"], ["b"], ["b"]] {
            run(search(&words, false), &gate).await.unwrap();
        }

        let out = run(Command::Stats { window: None }, &gate).await.unwrap();
        assert!(out.contains("Lookups (all time): 4"));
        assert!(out.contains("50.0%"));
        assert!(out.contains("Cached entries 2"));
        assert!(out.lines().any(|l| l.starts_with("2 ") && l.ends_with(" a")));
    }

    #[tokio::test]
    async fn test_stats_count_only_fresh_entries() {
        let gate = gate();
        run(search(&["live"], false), &gate).await.unwrap();
        run(
            Command::Search {
                query: vec!["expired".into()],
                ttl: Some(0),
                json: false,
            },
            &gate,
        )
        .await
        .unwrap();

        let out = run(Command::Stats { window: None }, &gate).await.unwrap();
        assert!(out.contains("Cached entries 1"));
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let gate = gate();
        let out = run(Command::Stats { window: Some(60) }, &gate).await.unwrap();
        assert!(out.contains("Lookups (last 60s): 0"));
        assert!(out.contains("No lookups recorded."));
    }

    #[tokio::test]
    async fn test_clear_variants() {
        let gate = gate();
        run(search(&["x"], false), &gate).await.unwrap();

        let out = run(
            Command::Clear(ClearArgs { stats: true, all: false }),
            &gate,
        )
        .await
        .unwrap();
        assert_eq!(out, "Removed 1 lookup records.");
        assert_eq!(gate.entry_count().await.unwrap(), 1);

        let out = run(
            Command::Clear(ClearArgs { stats: false, all: false }),
            &gate,
        )
        .await
        .unwrap();
        assert_eq!(out, "Removed 1 cached entries.");

        run(search(&["y"], false), &gate).await.unwrap();
        let out = run(
            Command::Clear(ClearArgs { stats: false, all: true }),
            &gate,
        )
        .await
        .unwrap();
        assert_eq!(out, "Removed 1 cached entries.\nRemoved 1 lookup records.");
        assert_eq!(gate.stats(None).await.unwrap().lookups(), 0);
    }

    #[tokio::test]
    async fn test_purge_keeps_fresh_entries() {
        let gate = gate();
        run(search(&["fresh"], false), &gate).await.unwrap();
        let out = run(Command::Purge, &gate).await.unwrap();
        assert_eq!(out, "Purged 0 expired entries.");
        assert_eq!(gate.entry_count().await.unwrap(), 1);
    }
}
