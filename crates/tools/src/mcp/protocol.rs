//! JSON-RPC 2.0 message types for tool servers.
//!
//! - **Requests**: client -> server (`initialize`, `tools/list`, `tools/call`)
//! - **Responses**: server -> client (result or error, matched by id)
//! - **Notifications**: either direction, no id, never answered

use agentweave_core::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC notification (no id, no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    /// The result payload, or the server's error as a protocol error.
    pub fn into_result(self) -> Result<Value, ToolError> {
        if let Some(error) = self.error {
            return Err(ToolError::Protocol(format!(
                "server error {}: {}",
                error.code, error.message
            )));
        }
        self.result
            .ok_or_else(|| ToolError::Protocol("response has neither result nor error".into()))
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// One tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Parameters of the `initialize` request.
pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": client_name, "version": client_version },
    })
}

/// Decode `result.tools` of a `tools/list` response.
pub fn parse_tool_list(result: &Value) -> Result<Vec<McpToolInfo>, ToolError> {
    let tools = result
        .get("tools")
        .cloned()
        .ok_or_else(|| ToolError::Protocol("tools/list result has no 'tools'".into()))?;
    serde_json::from_value(tools)
        .map_err(|e| ToolError::Protocol(format!("invalid tool list: {e}")))
}

/// Join the text parts of a `tools/call` result.
///
/// A result flagged `isError` becomes an execution failure carrying the
/// same text.
pub fn parse_call_result(tool_name: &str, result: &Value) -> Result<String, ToolError> {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: text,
        });
    }
    Ok(text)
}
