//! Bridge to external tool servers speaking JSON-RPC.
//!
//! ```text
//!   StdioMcpClient ──spawn──▶ server process
//!        │ initialize / tools/list
//!        ▼
//!   McpTool (one per advertised tool) ──register_tool──▶ Router
//!        │ execute(request)
//!        ▼
//!   tools/call { name, arguments }
//! ```

pub mod client;
pub mod protocol;
pub mod stdio;
pub mod tool;

pub use client::McpClient;
pub use protocol::McpToolInfo;
pub use stdio::StdioMcpClient;
pub use tool::{register_mcp_tools, McpTool};
