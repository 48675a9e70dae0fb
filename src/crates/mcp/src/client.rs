//! One MCP client: owns a spawned subprocess and multiplexes JSON-RPC
//! requests/responses over its stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::protocol::{parse_response_line, RpcResponse, RpcRequest};
use crate::tool::Tool;
use crate::types::{ProtocolInfo, ToolCallResult};

/// How long [`McpClient::close`] waits for a `shutdown` RPC response
/// before giving up on a graceful reply.
const SHUTDOWN_RPC_TIMEOUT: Duration = Duration::from_secs(5);
/// How long [`McpClient::close`] waits for the child process to exit on
/// its own after stdio is closed, before sending SIGKILL.
const PROCESS_EXIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Read buffer capacity per frame, so a single large tool result is not
/// truncated mid-line.
const LINE_BUFFER_CAPACITY: usize = 1024 * 1024;

type PendingMap = HashMap<i64, oneshot::Sender<RpcResponse>>;

/// A single subprocess speaking line-delimited JSON-RPC 2.0 over its
/// stdin/stdout, implementing the MCP handshake and tool protocol.
///
/// Owned by one [`crate::server_manager::ServerManager`] entry; not
/// constructed directly by callers outside this crate in the common
/// path, though it is a public type so tests and alternative wiring can
/// use it standalone.
pub struct McpClient {
    name: String,
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    next_id: AtomicI64,
    pending: Arc<Mutex<PendingMap>>,
    closed: AtomicBool,
    done_rx: watch::Receiver<bool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    protocol_info: Mutex<Option<ProtocolInfo>>,
}

impl McpClient {
    /// Validates `config`, spawns the child process with its command,
    /// args, and env merged over the current process environment, and
    /// starts the single reader task over its stdout.
    pub async fn spawn(config: &ServerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| McpError::ServerStartFailed(config.name.clone(), e.to_string()))?;

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = &config.work_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| McpError::ServerStartFailed(config.name.clone(), e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::ServerStartFailed(config.name.clone(), "no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::ServerStartFailed(config.name.clone(), "no stdout".into()))?;

        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let (done_tx, done_rx) = watch::channel(false);

        let reader = spawn_reader(config.name.clone(), stdout, Arc::clone(&pending), done_tx);

        Ok(Self {
            name: config.name.clone(),
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            next_id: AtomicI64::new(1),
            pending,
            closed: AtomicBool::new(false),
            done_rx,
            reader_task: Mutex::new(Some(reader)),
            protocol_info: Mutex::new(None),
        })
    }

    /// Sends `method`/`params` as a JSON-RPC request and awaits the
    /// correlated response or the server-done signal, whichever arrives
    /// first. The pending-id entry is removed on every exit path.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ServerNotRunning(self.name.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = RpcRequest::new(id, method, params);
        let line = request.to_line()?;

        if let Err(error) = self.stdin.lock().await.write_all(line.as_bytes()).await {
            self.pending.lock().await.remove(&id);
            return Err(McpError::Io(error.to_string()));
        }

        let mut done_rx = self.done_rx.clone();
        let result = tokio::select! {
            response = rx => {
                response.map_err(|_| McpError::ServerNotRunning(self.name.clone()))
            }
            _ = done_rx.wait_for(|done| *done) => {
                Err(McpError::ServerNotRunning(self.name.clone()))
            }
        };
        self.pending.lock().await.remove(&id);

        let response = result?;
        if let Some(error) = response.error {
            return Err(McpError::ToolExecutionFailed {
                tool: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Same as [`Self::call`] but fails with [`McpError::DeadlineExceeded`]
    /// if no response arrives within `timeout`.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(timeout, self.call(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::DeadlineExceeded),
        }
    }

    /// Performs the MCP handshake, storing the negotiated
    /// [`ProtocolInfo`] on success.
    pub async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": crate::protocol::PROTOCOL_VERSION,
            "clientInfo": { "name": "skillgraph", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": {},
        });

        let result = self
            .call("initialize", Some(params))
            .await
            .map_err(|e| McpError::InitializeFailed(self.name.clone(), e.to_string()))?;

        let info = ProtocolInfo {
            server_name: result
                .get("serverInfo")
                .and_then(|s| s.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or(&self.name)
                .to_string(),
            server_version: result
                .get("serverInfo")
                .and_then(|s| s.get("version"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            capabilities: result.get("capabilities").cloned().unwrap_or(Value::Null),
        };
        *self.protocol_info.lock().await = Some(info);
        Ok(())
    }

    pub async fn protocol_info(&self) -> Option<ProtocolInfo> {
        self.protocol_info.lock().await.clone()
    }

    /// Calls `tools/list` and parses `{tools:[{name,description,
    /// inputSchema}]}`. Tools failing [`Tool::is_valid`] are silently
    /// dropped.
    pub async fn discover_tools(&self) -> Result<Vec<Tool>> {
        let result = self.call("tools/list", None).await?;
        let raw_tools = result
            .get("tools")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        let mut tools = Vec::new();
        for raw in raw_tools {
            let tool = Tool {
                name: raw
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                description: raw
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                input_schema: raw.get("inputSchema").cloned().unwrap_or(Value::Null),
                server_name: self.name.clone(),
            };
            if tool.is_valid() {
                tools.push(tool);
            } else {
                tracing::debug!(server = %self.name, "dropping invalid tool from discovery");
            }
        }
        Ok(tools)
    }

    /// Calls `tools/call` for `tool_name` with `arguments`, returning the
    /// decoded [`ToolCallResult`].
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = json!({ "name": tool_name, "arguments": arguments });
        let result = self.call("tools/call", Some(params)).await.map_err(|e| {
            if let McpError::ToolExecutionFailed { code, message, .. } = e {
                McpError::ToolExecutionFailed {
                    tool: tool_name.to_string(),
                    code,
                    message,
                }
            } else {
                e
            }
        })?;
        serde_json::from_value(result)
            .map_err(|e| McpError::InvalidResponse(self.name.clone(), e.to_string()))
    }

    /// Once-only shutdown: best-effort `shutdown` RPC, then closes stdio,
    /// waits for the process to exit, and force-kills on timeout.
    /// Concurrent calls are a no-op after the first.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self
            .call_with_timeout("shutdown", None, SHUTDOWN_RPC_TIMEOUT)
            .await;

        // Dropping stdin closes the write half; the reader task observes
        // EOF on stdout and flips done_rx on its own.
        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }

        if let Some(reader) = self.reader_task.lock().await.take() {
            reader.abort();
        }

        let mut child = self.child.lock().await;
        let wait_result = tokio::time::timeout(PROCESS_EXIT_TIMEOUT, child.wait()).await;
        if wait_result.is_err() {
            tracing::warn!(server = %self.name, "MCP server did not exit in time, sending SIGKILL");
            let _ = child.start_kill();
        }
        Ok(())
    }
}

/// Reads lines from `stdout` until EOF or an I/O error, delivering each
/// parsed response to its matching pending request and flipping
/// `done_tx` on exit. Unmatched ids (already-removed entries, stray
/// notifications) are dropped with a debug log.
fn spawn_reader(
    server_name: String,
    stdout: tokio::process::ChildStdout,
    pending: Arc<Mutex<PendingMap>>,
    done_tx: watch::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::with_capacity(LINE_BUFFER_CAPACITY, stdout);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break, // EOF: process closed stdout.
                Ok(_) => {
                    if let Some(response) = parse_response_line(&line) {
                        let sender = pending.lock().await.remove(&response.id);
                        match sender {
                            Some(sender) => {
                                let _ = sender.send(response);
                            }
                            None => {
                                tracing::debug!(
                                    server = %server_name,
                                    id = response.id,
                                    "dropping MCP response with no matching pending request"
                                );
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::debug!(server = %server_name, %error, "MCP stdout read error, stopping reader");
                    break;
                }
            }
        }
        let _ = done_tx.send(true);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_capacity_is_at_least_one_mebibyte() {
        assert!(LINE_BUFFER_CAPACITY >= 1024 * 1024);
    }
}
