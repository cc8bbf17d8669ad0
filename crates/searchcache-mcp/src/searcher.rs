//! [`Searcher`] backed by an MCP search agent over stdio
//!
//! The agent process is started on the first search, not at construction,
//! so commands that never search (stats, clear) never spawn it. A failed
//! transport drops the session and the next search starts a fresh agent.
//! So does a call that times out or is abandoned by its caller, since the
//! agent may still be working on it.

use crate::config::SearchAgentConfig;
use crate::error::{MCPError, Result};
use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion,
};
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::ServiceExt;
use searchcache_gate::Searcher;
use searchcache_types::SearchCacheError;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Build the `ClientInfo` advertised during MCP initialization
fn client_info() -> ClientInfo {
    ClientInfo {
        protocol_version: ProtocolVersion::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "searchcache".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            title: None,
            description: None,
            icons: None,
            website_url: None,
        },
        meta: None,
    }
}

/// Combine the text blocks of a tool result into one JSON value
///
/// Each block is parsed as JSON, falling back to a plain string. One block
/// is returned as-is, several become an array, none is `null`.
#[must_use]
pub fn collect_output(texts: Vec<String>) -> Value {
    let mut values: Vec<Value> = texts
        .into_iter()
        .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
        .collect();

    match values.len() {
        0 => Value::Null,
        1 => values.pop().unwrap_or(Value::Null),
        _ => Value::Array(values),
    }
}

/// Live connection to the agent
struct Session {
    id: u64,
    peer: Peer<RoleClient>,
    // Dropping the running service shuts the agent down
    service: RunningService<RoleClient, ClientInfo>,
}

/// Search agent reached through an MCP tool call
pub struct McpSearcher {
    config: SearchAgentConfig,
    session: Mutex<Option<Session>>,
    next_session_id: AtomicU64,
}

/// Drops the session when a tool call is dropped before it finishes
struct CallGuard<'a> {
    searcher: &'a McpSearcher,
    session_id: u64,
    armed: bool,
}

impl CallGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.searcher.session.try_lock() {
            Ok(mut session) => {
                if session.as_ref().is_some_and(|s| s.id == self.session_id) {
                    warn!("Search agent call abandoned, dropping session");
                    session.take();
                }
            }
            Err(_) => warn!("Search agent call abandoned while the session was busy"),
        }
    }
}

impl McpSearcher {
    /// Create a searcher; the agent is not started until the first search
    #[must_use]
    pub fn new(config: SearchAgentConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            next_session_id: AtomicU64::new(0),
        }
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &SearchAgentConfig {
        &self.config
    }

    /// Whether an agent process is currently connected
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Stop the agent if it is running
    pub async fn shutdown(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            Self::stop(session).await;
        }
    }

    /// Stop the agent only if `session_id` is still the running session
    async fn reset(&self, session_id: u64) {
        let session = {
            let mut current = self.session.lock().await;
            if current.as_ref().is_some_and(|s| s.id == session_id) {
                current.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            Self::stop(session).await;
        }
    }

    async fn stop(session: Session) {
        drop(session.peer);
        match session.service.cancel().await {
            Ok(reason) => debug!("Search agent stopped: {:?}", reason),
            Err(e) => warn!("Search agent did not stop cleanly: {}", e),
        }
    }

    /// Session id and peer for the running agent, starting it if needed
    async fn peer(&self) -> Result<(u64, Peer<RoleClient>)> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            return Ok((existing.id, existing.peer.clone()));
        }

        let started = self.start().await?;
        let current = (started.id, started.peer.clone());
        *session = Some(started);
        Ok(current)
    }

    async fn start(&self) -> Result<Session> {
        let (program, args) = self.config.program_and_args()?;
        let timeout = self.config.startup_timeout();
        info!("Starting search agent '{}' with timeout {:?}", program, timeout);

        tokio::time::timeout(timeout, self.connect(&program, &args))
            .await
            .map_err(|_| MCPError::StartupTimeout {
                program: program.clone(),
                timeout,
            })?
    }

    async fn connect(&self, program: &str, args: &[String]) -> Result<Session> {
        debug!("Spawning {} {:?}", program, args);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
            // Config loaders may lowercase keys read from the environment
            let upper = key.to_uppercase();
            if upper != *key {
                cmd.env(upper, value);
            }
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::null());
        cmd.kill_on_drop(true);

        let startup_failed = |reason: String| MCPError::StartupFailed {
            program: program.into(),
            reason,
        };

        let transport = rmcp::transport::TokioChildProcess::new(cmd)
            .map_err(|e| startup_failed(format!("spawn failed: {e}")))?;

        let service: RunningService<RoleClient, ClientInfo> = client_info()
            .serve(transport)
            .await
            .map_err(|e| startup_failed(format!("MCP initialization failed: {e}")))?;

        let peer = service.peer().clone();

        let tools = peer
            .list_tools(None)
            .await
            .map_err(|e| startup_failed(format!("listing tools failed: {e}")))?
            .tools;

        if !tools.iter().any(|tool| *tool.name == self.config.tool) {
            let available = tools
                .iter()
                .map(|tool| tool.name.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(MCPError::ToolNotFound {
                tool: self.config.tool.clone(),
                available,
            });
        }

        info!(
            "Search agent '{}' connected ({} tools, using '{}')",
            program,
            tools.len(),
            self.config.tool
        );

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Ok(Session { id, peer, service })
    }

    async fn call(&self, query: &str) -> Result<Value> {
        let (session_id, peer) = self.peer().await?;
        let tool = self.config.tool.clone();
        let timeout = self.config.timeout();
        debug!("Calling tool '{}' for query '{}'", tool, query);

        let guard = CallGuard {
            searcher: self,
            session_id,
            armed: true,
        };
        let response = tokio::time::timeout(
            timeout,
            peer.call_tool(CallToolRequestParams {
                name: tool.clone().into(),
                arguments: Some(self.config.arguments_for(query)),
                meta: None,
                task: None,
            }),
        )
        .await;

        let failure = match response {
            Ok(Ok(result)) => {
                guard.disarm();
                return Self::tool_output(tool, result);
            }
            Ok(Err(e)) => {
                warn!("Search agent call failed, dropping session: {}", e);
                MCPError::ToolExecution {
                    tool,
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    "Search agent did not answer within {:?}, dropping session",
                    timeout
                );
                MCPError::CallTimeout { tool, timeout }
            }
        };

        self.reset(session_id).await;
        guard.disarm();
        Err(failure)
    }

    fn tool_output(tool: String, result: CallToolResult) -> Result<Value> {
        let texts = result
            .content
            .iter()
            .filter_map(|content| content.as_text().map(|text| text.text.clone()))
            .collect();
        let mut output = collect_output(texts);
        if output.is_null() {
            if let Some(structured) = result.structured_content {
                output = structured;
            }
        }

        if result.is_error.unwrap_or(false) {
            return Err(MCPError::ToolExecution {
                tool,
                reason: format!("tool returned error: {output}"),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Searcher for McpSearcher {
    async fn search(&self, query: &str) -> searchcache_types::Result<Value> {
        self.call(query)
            .await
            .map_err(|e| SearchCacheError::search_failed(query, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_output_single_json() {
        let value = collect_output(vec![r#"{"results": [1, 2]}"#.into()]);
        assert_eq!(value, json!({"results": [1, 2]}));
    }

    #[test]
    fn test_collect_output_plain_text() {
        let value = collect_output(vec!["no json here".into()]);
        assert_eq!(value, json!("no json here"));
    }

    #[test]
    fn test_collect_output_many_and_none() {
        let value = collect_output(vec!["1".into(), "two".into()]);
        assert_eq!(value, json!([1, "two"]));
        assert_eq!(collect_output(Vec::new()), Value::Null);
    }

    #[tokio::test]
    async fn test_unconfigured_command_fails_search() {
        let searcher = McpSearcher::new(SearchAgentConfig::default());
        let err = searcher.search("rust").await.unwrap_err();
        match err {
            SearchCacheError::SearchFailed { query, reason } => {
                assert_eq!(query, "rust");
                assert!(reason.contains("search.command"));
            }
            other => panic!("expected SearchFailed, got {other:?}"),
        }
        assert!(!searcher.is_connected().await);
    }
}
