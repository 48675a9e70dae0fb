//! MCP subprocess client, server lifecycle manager, and cross-server tool
//! registry.
//!
//! This crate owns three layers that sit directly on top of each other:
//! [`McpClient`] multiplexes JSON-RPC requests over one subprocess's
//! stdio; [`ServerManager`] owns the lifecycle state machine for any
//! number of named servers, each backed by one client; [`ToolRegistry`]
//! presents a flat, fully-qualified-name view across every server the
//! manager knows about, starting servers lazily on first use.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server_manager;
pub mod tool;
pub mod types;

pub use client::McpClient;
pub use config::{load_server_configs, ServerConfig};
pub use error::{McpError, Result};
pub use registry::ToolRegistry;
pub use server_manager::{Server, ServerManager, ServerState};
pub use tool::{parse_full_name, Tool};
pub use types::{ContentBlock, ProtocolInfo, ToolCallResult};
