//! Tool-server client over a child process's stdin/stdout.
//!
//! Messages are newline-delimited JSON-RPC. One request is in flight at a
//! time; server notifications and stray responses are skipped while we
//! wait for the id we sent.

use agentweave_config::McpServerConfig;
use agentweave_core::{Arguments, ToolError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::McpClient;
use super::protocol::{
    initialize_params, parse_call_result, parse_tool_list, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpToolInfo,
};

/// A running server process.
struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Client for a tool server launched as a subprocess.
pub struct StdioMcpClient {
    server_name: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    request_timeout: Duration,
    next_id: AtomicU64,
    session: Mutex<Option<Session>>,
}

impl StdioMcpClient {
    pub fn new(server_name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            server_name: server_name.into(),
            command: command.into(),
            args,
            env: HashMap::new(),
            request_timeout: Duration::from_secs(30),
            next_id: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    /// Build a client from a `[mcp_servers.<name>]` entry.
    pub fn from_config(server_name: impl Into<String>, config: &McpServerConfig) -> Self {
        Self::new(server_name, &config.command, config.args.clone())
            .with_env(config.env.clone())
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn spawn(&self) -> Result<Session, ToolError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::Transport(format!("failed to start '{}': {e}", self.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Transport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Transport("child stdout unavailable".into()))?;

        Ok(Session {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request and wait for its response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| ToolError::Transport(format!("server '{}' not initialized", self.server_name)))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(server = %self.server_name, id, method, "Sending tool-server request");
        write_message(&mut session.stdin, &request).await?;

        let response = tokio::time::timeout(self.request_timeout, read_response(&mut session.stdout, id))
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: format!("{}:{method}", self.server_name),
                timeout_secs: self.request_timeout.as_secs(),
            })??;

        response.into_result()
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| ToolError::Transport(format!("server '{}' not initialized", self.server_name)))?;
        write_message(&mut session.stdin, &JsonRpcNotification::new(method)).await
    }
}

#[async_trait]
impl McpClient for StdioMcpClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn initialize(&self) -> Result<(), ToolError> {
        {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                *guard = Some(self.spawn()?);
            }
        }

        let result = self
            .request("initialize", Some(initialize_params("agentweave", env!("CARGO_PKG_VERSION"))))
            .await?;
        self.notify("notifications/initialized").await?;

        info!(
            server = %self.server_name,
            protocol = %result.get("protocolVersion").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "Tool server initialized"
        );
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, ToolError> {
        let result = self.request("tools/list", None).await?;
        parse_tool_list(&result)
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<String, ToolError> {
        let result = self
            .request(
                "tools/call",
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        parse_call_result(name, &result)
    }

    async fn cleanup(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };
        if let Err(e) = session.child.kill().await {
            warn!(server = %self.server_name, error = %e, "Failed to stop tool server");
        }
        info!(server = %self.server_name, "Tool server stopped");
    }
}

/// Write one message as a JSON line.
async fn write_message<W, M>(writer: &mut W, message: &M) -> Result<(), ToolError>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    let mut line = serde_json::to_string(message)
        .map_err(|e| ToolError::Protocol(format!("failed to encode message: {e}")))?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| ToolError::Transport(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| ToolError::Transport(e.to_string()))
}

/// Read lines until the response carrying `id` arrives.
async fn read_response<R>(reader: &mut R, id: u64) -> Result<JsonRpcResponse, ToolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        if bytes_read == 0 {
            return Err(ToolError::Transport("tool server closed its output".into()));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(response) if response.id == Some(id) => return Ok(response),
            Ok(_) => debug!(line = %trimmed, "Skipping notification or unrelated response"),
            Err(_) => debug!(line = %trimmed, "Skipping non-JSON line from tool server"),
        }
    }
}
