//! Error types for the MCP client, server manager, and tool registry.

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Errors arising from MCP subprocess management and tool invocation.
#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("server '{0}' not found")]
    ServerNotFound(String),

    #[error("server '{0}' is not running")]
    ServerNotRunning(String),

    #[error("server '{0}' is already running")]
    ServerAlreadyRunning(String),

    #[error("server '{0}' failed to start: {1}")]
    ServerStartFailed(String, String),

    #[error("server '{0}' timed out: {1}")]
    ServerTimeout(String, String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("tool '{tool}' execution failed (code {code}): {message}")]
    ToolExecutionFailed {
        tool: String,
        code: i64,
        message: String,
    },

    #[error("invalid tool name '{0}'")]
    InvalidToolName(String),

    #[error("handshake with server '{0}' failed: {1}")]
    InitializeFailed(String, String),

    #[error("invalid response from server '{0}': {1}")]
    InvalidResponse(String, String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("call exceeded its deadline")]
    DeadlineExceeded,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization(err.to_string())
    }
}
