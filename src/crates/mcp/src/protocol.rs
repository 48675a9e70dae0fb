//! Line-delimited JSON-RPC 2.0 frame types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP protocol version this client negotiates during handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// An outgoing JSON-RPC request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes to a single JSON-RPC line, with the trailing newline
    /// the wire format requires.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An incoming JSON-RPC response frame: either `result` or `error` is
/// present, never both.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: i64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Parses one line of input as an [`RpcResponse`]. Malformed or empty
/// lines return `None` rather than an error: the MCP reader task skips
/// them silently, logging at debug level.
pub fn parse_response_line(line: &str) -> Option<RpcResponse> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(response) => Some(response),
        Err(error) => {
            tracing::debug!(%error, line = trimmed, "dropping malformed MCP response line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_with_trailing_newline() {
        let request = RpcRequest::new(1, "initialize", Some(serde_json::json!({"a": 1})));
        let line = request.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn test_parse_response_line_success() {
        let line = r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
        let response = parse_response_line(line).unwrap();
        assert_eq!(response.id, 1);
        assert!(response.result.is_some());
    }

    #[test]
    fn test_parse_response_line_skips_empty() {
        assert!(parse_response_line("").is_none());
        assert!(parse_response_line("   \n").is_none());
    }

    #[test]
    fn test_parse_response_line_skips_malformed() {
        assert!(parse_response_line("not json").is_none());
    }

    #[test]
    fn test_parse_response_line_error_object() {
        let line = r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"not found"}}"#;
        let response = parse_response_line(line).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
    }
}
