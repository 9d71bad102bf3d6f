//! Tools for AgentWeave.
//!
//! - [`FunctionTool`]: an in-process tool backed by an async closure
//! - [`mcp`]: the bridge to external tool servers over stdio JSON-RPC
//!
//! Everything here implements `agentweave_core::Tool` and is registered on a
//! `Router` by name.

pub mod function;
pub mod mcp;

pub use function::FunctionTool;
pub use mcp::{register_mcp_tools, McpClient, McpTool, McpToolInfo, StdioMcpClient};
