//! MCP search agent for searchcache
//!
//! Implements the gate's [`searchcache_gate::Searcher`] by calling a tool on
//! an MCP server launched as a child process.
//!
//! ## Features
//!
//! - Lazy startup on the first search, with a startup timeout
//! - Configurable tool name, query argument and fixed extra arguments
//! - Per-call timeout; a broken transport or an unanswered call restarts the agent

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod config;
pub mod error;
pub mod searcher;

pub use config::SearchAgentConfig;
pub use error::MCPError;
pub use searcher::{collect_output, McpSearcher};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{MCPError, McpSearcher, SearchAgentConfig};
}
