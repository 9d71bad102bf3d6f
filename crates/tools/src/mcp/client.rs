//! The external tool-server contract.

use agentweave_core::{Arguments, ToolError};
use async_trait::async_trait;

use super::protocol::McpToolInfo;

/// A connection to one tool server.
///
/// Implementations must be safe to share: every discovered tool holds an
/// `Arc` to the client it came from.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Name used to tag logs and tool metadata.
    fn server_name(&self) -> &str;

    /// Start the server (if needed) and perform the protocol handshake.
    async fn initialize(&self) -> Result<(), ToolError>;

    /// Tools the server exposes.
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, ToolError>;

    /// Invoke one tool and return its text output.
    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<String, ToolError>;

    /// Release the server. Further calls fail.
    async fn cleanup(&self);
}
