//! Error types for the MCP search agent

use std::time::Duration;
use thiserror::Error;

/// MCP search agent errors
#[derive(Debug, Error)]
pub enum MCPError {
    /// Agent process could not be launched or initialized
    #[error("Search agent '{program}' failed to start: {reason}")]
    StartupFailed {
        /// Program that was launched
        program: String,
        /// Failure reason
        reason: String,
    },

    /// Startup timeout exceeded
    #[error("Search agent '{program}' did not start within {timeout:?}")]
    StartupTimeout {
        /// Program that was launched
        program: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Configured tool is not offered by the agent
    #[error("Tool '{tool}' not found on search agent (available: {available})")]
    ToolNotFound {
        /// Configured tool name
        tool: String,
        /// Comma-separated tools the agent does offer
        available: String,
    },

    /// Tool call failed or the tool reported an error
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecution {
        /// Tool name
        tool: String,
        /// Failure reason
        reason: String,
    },

    /// Tool call did not answer in time
    #[error("Tool '{tool}' timed out after {timeout:?}")]
    CallTimeout {
        /// Tool name
        tool: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, MCPError>;
