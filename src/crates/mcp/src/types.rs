//! Wire-level result types for MCP tool invocation.

use serde::{Deserialize, Serialize};

/// One block of a tool call's result content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// The decoded result of a `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Concatenates the `text` field of every content block, in order.
    /// Convenient for tools (like a simple echo tool) whose entire result
    /// is a single text block.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Negotiated handshake info, stored after a successful `initialize`
/// call.
#[derive(Debug, Clone, Default)]
pub struct ProtocolInfo {
    pub server_name: String,
    pub server_version: String,
    pub capabilities: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_concatenates_blocks() {
        let result = ToolCallResult {
            content: vec![
                ContentBlock {
                    content_type: "text".into(),
                    text: Some("hi".into()),
                },
                ContentBlock {
                    content_type: "text".into(),
                    text: Some(" there".into()),
                },
            ],
            is_error: false,
        };
        assert_eq!(result.text_content(), "hi there");
    }
}
