//! MCP tool value objects and fully-qualified name parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{McpError, Result};

/// A capability exposed by an MCP server, tagged with the owning server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server_name: String,
}

impl Tool {
    /// The fully-qualified name `mcp__{server}__{tool}`.
    pub fn full_name(&self) -> String {
        format!("mcp__{}__{}", self.server_name, self.name)
    }

    /// `true` iff this tool has a non-empty `name`, matching the local
    /// validation tool discovery silently drops failures of.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.server_name.trim().is_empty()
    }
}

/// Splits a fully-qualified tool name into `(server, tool)`.
///
/// The name is expected to start with the literal `mcp__` prefix,
/// followed by the server name, `__`, then the tool name. The split is
/// bounded to at most three segments so a tool name that itself contains
/// `__` is preserved intact (only the first two `__` delimiters are
/// structural).
pub fn parse_full_name(full_name: &str) -> Result<(String, String)> {
    let rest = full_name
        .strip_prefix("mcp__")
        .ok_or_else(|| McpError::InvalidToolName(full_name.to_string()))?;

    let mut parts = rest.splitn(2, "__");
    let server = parts.next().unwrap_or("");
    let tool = parts.next().unwrap_or("");

    if server.is_empty() || tool.is_empty() {
        return Err(McpError::InvalidToolName(full_name.to_string()));
    }

    Ok((server.to_string(), tool.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(server: &str, name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            server_name: server.to_string(),
        }
    }

    #[test]
    fn test_full_name_round_trip() {
        let t = tool("test", "echo");
        let full = t.full_name();
        assert_eq!(full, "mcp__test__echo");
        let (server, name) = parse_full_name(&full).unwrap();
        assert_eq!(server, t.server_name);
        assert_eq!(name, t.name);
    }

    #[test]
    fn test_parse_full_name_preserves_double_underscore_in_tool_segment() {
        let (server, name) = parse_full_name("mcp__test__get__file").unwrap();
        assert_eq!(server, "test");
        assert_eq!(name, "get__file");
    }

    #[test]
    fn test_parse_full_name_rejects_missing_prefix() {
        assert!(parse_full_name("test__echo").is_err());
    }

    #[test]
    fn test_parse_full_name_rejects_empty_segments() {
        assert!(parse_full_name("mcp____echo").is_err());
        assert!(parse_full_name("mcp__test__").is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(tool("test", "echo").is_valid());
        assert!(!tool("", "echo").is_valid());
        assert!(!tool("test", "").is_valid());
    }
}
