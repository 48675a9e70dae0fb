//! Cross-server, fully-qualified-name view over every configured MCP
//! server, starting servers lazily on first use.

use std::path::PathBuf;

use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::server_manager::ServerManager;
use crate::tool::{parse_full_name, Tool};
use crate::types::ToolCallResult;

/// Presents the set of tools across all configured servers as a flat
/// list of fully-qualified names, deferring process spawn until a tool
/// on that server is actually invoked or its tools are listed.
pub struct ToolRegistry {
    manager: ServerManager,
    configs: Vec<ServerConfig>,
}

impl ToolRegistry {
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self {
            manager: ServerManager::new(),
            configs,
        }
    }

    /// Loads server configs from `path` via [`crate::config::load_server_configs`]
    /// and builds a registry over them. A missing config file yields an
    /// empty registry, not an error.
    pub fn from_config_file(path: &PathBuf) -> Result<Self> {
        let configs = crate::config::load_server_configs(path)?;
        Ok(Self::new(configs))
    }

    fn find_config(&self, server_name: &str) -> Result<&ServerConfig> {
        self.configs
            .iter()
            .find(|c| c.name == server_name)
            .ok_or_else(|| McpError::ServerNotFound(server_name.to_string()))
    }

    /// Starts `server_name` if it is not already `ready`, using its
    /// stored [`ServerConfig`].
    pub async fn ensure_started(&self, server_name: &str) -> Result<()> {
        if self.manager.is_ready(server_name).await {
            return Ok(());
        }
        let config = self.find_config(server_name)?.clone();
        self.manager.start(config).await
    }

    /// Invokes `tool` on the server named in `full_name`
    /// (`mcp__{server}__{tool}`), starting the server on first use.
    pub async fn call_tool_by_full_name(&self, full_name: &str, arguments: Value) -> Result<ToolCallResult> {
        let (server, tool) = parse_full_name(full_name)?;
        self.ensure_started(&server).await?;
        self.manager.call_tool(&server, &tool, arguments).await
    }

    /// Starts every configured server (best-effort; failures are logged
    /// and skipped) and returns the union of their tools, named with
    /// [`Tool::full_name`].
    pub async fn get_all_tools(&self) -> Vec<Tool> {
        for config in &self.configs {
            if !self.manager.is_ready(&config.name).await {
                if let Err(error) = self.manager.start(config.clone()).await {
                    tracing::warn!(server = %config.name, %error, "skipping server while listing all tools");
                }
            }
        }
        self.manager.all_tools().await
    }

    /// Shuts down every started server. Intended for workflow teardown.
    pub async fn shutdown(&self) -> Result<()> {
        self.manager.stop_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_tool_by_full_name_rejects_malformed_name() {
        let registry = ToolRegistry::new(vec![]);
        let result = registry.call_tool_by_full_name("not-mcp-prefixed", serde_json::json!({})).await;
        assert!(matches!(result, Err(McpError::InvalidToolName(_))));
    }

    #[tokio::test]
    async fn test_call_tool_by_full_name_rejects_unknown_server() {
        let registry = ToolRegistry::new(vec![]);
        let result = registry
            .call_tool_by_full_name("mcp__ghost__echo", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(McpError::ServerNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_all_tools_empty_registry() {
        let registry = ToolRegistry::new(vec![]);
        assert!(registry.get_all_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_empty_registry_is_ok() {
        let registry = ToolRegistry::new(vec![]);
        assert!(registry.shutdown().await.is_ok());
    }
}
