//! MCP server configuration and the external config-file shape.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// How to spawn one MCP server subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub work_dir: Option<String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// `name` and `command` must be non-empty after trim. Entries that
    /// fail this check are skipped by the config loader rather than
    /// aborting the whole load.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(McpError::InvalidConfig("server name must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(McpError::InvalidConfig(format!(
                "server '{}' command must not be empty",
                self.name
            )));
        }
        Ok(())
    }
}

/// The on-disk shape: `{"mcpServers": {"<name>": {...}}}`.
#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: HashMap<String, RawServerEntry>,
}

#[derive(Debug, Deserialize)]
struct RawServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(rename = "workDir", default)]
    work_dir: Option<String>,
}

/// Loads server configs from `path`. An absent file is "no servers
/// configured", not an error. Invalid JSON is `INVALID_CONFIG`. Entries
/// that individually fail [`ServerConfig::validate`] are skipped (and
/// logged at warn) rather than failing the whole load.
pub fn load_server_configs(path: &Path) -> Result<Vec<ServerConfig>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)?;
    let parsed: McpConfigFile = serde_json::from_str(&contents)
        .map_err(|e| McpError::InvalidConfig(format!("{}: {e}", path.display())))?;

    let mut configs = Vec::new();
    for (name, entry) in parsed.mcp_servers {
        let config = ServerConfig {
            name: name.clone(),
            command: entry.command,
            args: entry.args,
            env: entry.env,
            work_dir: entry.work_dir,
        };
        match config.validate() {
            Ok(()) => configs.push(config),
            Err(error) => tracing::warn!(server = %name, %error, "skipping invalid MCP server config entry"),
        }
    }
    Ok(configs)
}
