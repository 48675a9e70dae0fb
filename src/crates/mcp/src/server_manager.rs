//! Lifecycle manager for N named MCP server subprocesses.
//!
//! Each server moves through the state machine `stopped → starting →
//! initializing → ready → stopping → stopped`, with `error` reachable
//! from any pre-ready state. `ready` is the only state in which a server
//! is considered running; `stopped` and `error` are terminal until a
//! fresh [`ServerManager::start`] call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::client::McpClient;
use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::tool::Tool;
use crate::types::ToolCallResult;

/// Lifecycle state of one managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Initializing,
    Ready,
    Stopping,
    Error,
}

impl ServerState {
    pub fn is_running(&self) -> bool {
        *self == ServerState::Ready
    }
}

/// One tracked server instance: its config, client handle (once spawned),
/// current state, and cached tool list.
pub struct Server {
    pub config: ServerConfig,
    pub client: Option<Arc<McpClient>>,
    pub state: ServerState,
    pub started_at: Option<Instant>,
    pub last_activity: Option<Instant>,
    pub tools: Vec<Tool>,
    pub err: Option<String>,
}

impl Server {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            client: None,
            state: ServerState::Stopped,
            started_at: None,
            last_activity: None,
            tools: Vec::new(),
            err: None,
        }
    }
}

/// Owns the lifecycle of every configured MCP server, guarded by a single
/// read-write lock.
#[derive(Default)]
pub struct ServerManager {
    servers: RwLock<HashMap<String, Server>>,
}

impl ServerManager {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a server from `config`: `starting` → spawn the client →
    /// `initializing` → handshake → discover tools → `ready`. Rejects
    /// with [`McpError::ServerAlreadyRunning`] if a `ready` instance for
    /// `config.name` already exists. Any failure along the way leaves the
    /// instance in `error` state with its client closed.
    pub async fn start(&self, config: ServerConfig) -> Result<()> {
        {
            let servers = self.servers.read().await;
            if let Some(existing) = servers.get(&config.name) {
                if existing.state.is_running() {
                    return Err(McpError::ServerAlreadyRunning(config.name.clone()));
                }
            }
        }

        let name = config.name.clone();
        {
            let mut servers = self.servers.write().await;
            let entry = servers.entry(name.clone()).or_insert_with(|| Server::new(config.clone()));
            entry.config = config.clone();
            entry.state = ServerState::Starting;
            entry.err = None;
            tracing::info!(server = %name, state = "starting", "MCP server transitioning");
        }

        let result = self.bring_up(&config).await;
        let mut servers = self.servers.write().await;
        let entry = servers.get_mut(&name).expect("inserted above");
        match result {
            Ok((client, tools)) => {
                entry.client = Some(Arc::new(client));
                entry.tools = tools;
                entry.state = ServerState::Ready;
                entry.started_at = Some(Instant::now());
                entry.last_activity = entry.started_at;
                tracing::info!(server = %name, state = "ready", tool_count = entry.tools.len(), "MCP server ready");
                Ok(())
            }
            Err(error) => {
                entry.state = ServerState::Error;
                entry.err = Some(error.to_string());
                tracing::warn!(server = %name, %error, "MCP server failed to start");
                Err(error)
            }
        }
    }

    async fn bring_up(&self, config: &ServerConfig) -> Result<(McpClient, Vec<Tool>)> {
        {
            let mut servers = self.servers.write().await;
            if let Some(entry) = servers.get_mut(&config.name) {
                entry.state = ServerState::Initializing;
            }
        }
        tracing::info!(server = %config.name, state = "initializing", "MCP server transitioning");

        let client = McpClient::spawn(config)
            .await
            .map_err(|e| McpError::ServerStartFailed(config.name.clone(), e.to_string()))?;
        client.initialize().await?;
        let tools = client.discover_tools().await?;
        Ok((client, tools))
    }

    /// Stops a server: `stopping` → close its client → `stopped`, then
    /// removes the tracked instance entirely. Missing server →
    /// [`McpError::ServerNotFound`]. A no-op (not an error) when the
    /// server is already stopped.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let client = {
            let mut servers = self.servers.write().await;
            let entry = servers
                .get_mut(name)
                .ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
            if entry.state == ServerState::Stopped {
                return Ok(());
            }
            entry.state = ServerState::Stopping;
            tracing::info!(server = %name, state = "stopping", "MCP server transitioning");
            entry.client.take()
        };

        if let Some(client) = client {
            client.close().await?;
        }

        let mut servers = self.servers.write().await;
        servers.remove(name);
        tracing::info!(server = %name, state = "stopped", "MCP server removed");
        Ok(())
    }

    /// Best-effort stop of every tracked server. Returns the last error
    /// encountered, if any; every server is attempted regardless of
    /// earlier failures.
    pub async fn stop_all(&self) -> Result<()> {
        let names: Vec<String> = self.servers.read().await.keys().cloned().collect();
        let mut last_err = None;
        for name in names {
            if let Err(error) = self.stop(&name).await {
                tracing::warn!(server = %name, %error, "error stopping MCP server");
                last_err = Some(error);
            }
        }
        match last_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// A defensive copy of the cached tools for `name`, iff it is
    /// currently `ready`.
    pub async fn list_tools(&self, name: &str) -> Result<Vec<Tool>> {
        let servers = self.servers.read().await;
        let entry = servers
            .get(name)
            .ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        if !entry.state.is_running() {
            return Err(McpError::ServerNotRunning(name.to_string()));
        }
        Ok(entry.tools.clone())
    }

    /// Calls `tool` on server `name` with `arguments`. Only valid while
    /// the server is `ready`. `lastActivity` is updated regardless of the
    /// call's outcome.
    pub async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> Result<ToolCallResult> {
        let client = {
            let servers = self.servers.read().await;
            let entry = servers
                .get(name)
                .ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
            if !entry.state.is_running() {
                return Err(McpError::ServerNotRunning(name.to_string()));
            }
            entry.client.clone().expect("ready server always has a client")
        };

        let result = client.call_tool(tool, arguments).await;

        let mut servers = self.servers.write().await;
        if let Some(entry) = servers.get_mut(name) {
            entry.last_activity = Some(Instant::now());
        }
        result
    }

    /// `true` iff `name` is currently tracked in the `ready` state.
    pub async fn is_ready(&self, name: &str) -> bool {
        self.servers
            .read()
            .await
            .get(name)
            .map(|s| s.state.is_running())
            .unwrap_or(false)
    }

    /// Aggregates the cached tools of every currently `ready` server.
    pub async fn all_tools(&self) -> Vec<Tool> {
        self.servers
            .read()
            .await
            .values()
            .filter(|s| s.state.is_running())
            .flat_map(|s| s.tools.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_missing_server_is_not_found() {
        let manager = ServerManager::new();
        assert!(matches!(
            manager.stop("ghost").await,
            Err(McpError::ServerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_tools_missing_server_is_not_found() {
        let manager = ServerManager::new();
        assert!(matches!(
            manager.list_tools("ghost").await,
            Err(McpError::ServerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_call_tool_missing_server_is_not_found() {
        let manager = ServerManager::new();
        let result = manager.call_tool("ghost", "echo", serde_json::json!({})).await;
        assert!(matches!(result, Err(McpError::ServerNotFound(_))));
    }

    #[tokio::test]
    async fn test_is_ready_false_for_unknown_server() {
        let manager = ServerManager::new();
        assert!(!manager.is_ready("ghost").await);
    }

    #[tokio::test]
    async fn test_all_tools_empty_with_no_servers() {
        let manager = ServerManager::new();
        assert!(manager.all_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_nonexistent_command_lands_in_error_state() {
        let manager = ServerManager::new();
        let config = ServerConfig::new("broken", "/nonexistent/binary-that-does-not-exist");
        let result = manager.start(config).await;
        assert!(result.is_err());
        assert!(matches!(
            manager.call_tool("broken", "x", serde_json::json!({})).await,
            Err(McpError::ServerNotFound(_)) | Err(McpError::ServerNotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_on_already_stopped_via_remove() {
        let manager = ServerManager::new();
        let config = ServerConfig::new("broken", "/nonexistent/binary-that-does-not-exist");
        let _ = manager.start(config).await;
        // The failed start leaves the entry in `error`, not `stopped`, but
        // stop() still tears it down cleanly (no client to close).
        let result = manager.stop("broken").await;
        assert!(result.is_ok());
    }
}
