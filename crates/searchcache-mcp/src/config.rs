//! Configuration for the external search agent

use crate::error::{MCPError, Result};
use searchcache_gate::RetryPolicy;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Search agent configuration, the `[search]` section of the config file
#[derive(Debug, Deserialize, Clone)]
pub struct SearchAgentConfig {
    /// Command that launches the MCP search server (e.g. `"npx -y some-search-mcp"`)
    #[serde(default)]
    pub command: String,

    /// Optional separate arguments list
    ///
    /// If provided, `command` is treated as the program name only.
    /// If omitted, `command` is split on whitespace into program + args.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Tool to call for each search
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Name of the tool argument that carries the query
    #[serde(default = "default_query_argument")]
    pub query_argument: String,

    /// Fixed extra arguments sent with every call (e.g. `max_results`)
    #[serde(default)]
    pub extra_arguments: Map<String, Value>,

    /// Seconds to wait for the agent to start and list its tools
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Seconds a single search may take
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed search
    #[serde(default)]
    pub retries: u32,

    /// Delay before the first retry, in milliseconds; doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_tool() -> String {
    "web_search".to_string()
}

fn default_query_argument() -> String {
    "query".to_string()
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for SearchAgentConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            tool: default_tool(),
            query_argument: default_query_argument(),
            extra_arguments: Map::new(),
            startup_timeout_secs: default_startup_timeout(),
            timeout_secs: default_timeout(),
            retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl SearchAgentConfig {
    /// Resolve the program and its arguments
    ///
    /// # Errors
    /// Returns `Config` when no command is configured
    pub fn program_and_args(&self) -> Result<(String, Vec<String>)> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MCPError::Config("search.command is not set".into()))?
            .to_string();

        if self.args.is_empty() {
            Ok((program, parts.map(str::to_string).collect()))
        } else {
            // Explicit args: command is just the program name
            Ok((self.command.trim().to_string(), self.args.clone()))
        }
    }

    /// Tool arguments for one query
    #[must_use]
    pub fn arguments_for(&self, query: &str) -> Map<String, Value> {
        let mut arguments = self.extra_arguments.clone();
        arguments.insert(self.query_argument.clone(), Value::String(query.into()));
        arguments
    }

    /// Startup timeout as a `Duration`
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Per-search timeout as a `Duration`
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Initial retry backoff as a `Duration`
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Retry policy the gate applies around each search
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.retries, self.retry_backoff())
    }
}
