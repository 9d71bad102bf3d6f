//! Discovered tools wrapped as router tools.

use agentweave_core::{Request, Response, Router, Tool, ToolError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::McpClient;
use super::protocol::McpToolInfo;

/// One tool advertised by a tool server.
pub struct McpTool {
    info: McpToolInfo,
    client: Arc<dyn McpClient>,
}

impl McpTool {
    pub fn new(info: McpToolInfo, client: Arc<dyn McpClient>) -> Self {
        Self { info, client }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.info.input_schema.clone()
    }

    async fn execute(&self, request: Request) -> Response {
        let server = self.client.server_name().to_string();
        match self.client.call_tool(&self.info.name, request.arguments.clone()).await {
            Ok(text) => Response::completed(text)
                .with_extra("server", server)
                .with_request(request),
            Err(e) => {
                warn!(tool = %self.info.name, server = %server, error = %e, "Tool call failed");
                Response::failed(e.to_string())
                    .with_extra("server", server)
                    .with_request(request)
            }
        }
    }
}

/// Handshake with `client`, list its tools and register each by name.
///
/// Returns the registered tool names.
pub async fn register_mcp_tools(
    router: &Router,
    client: Arc<dyn McpClient>,
) -> Result<Vec<String>, ToolError> {
    client.initialize().await?;
    let tools = client.list_tools().await?;

    let mut names = Vec::with_capacity(tools.len());
    for info in tools {
        names.push(info.name.clone());
        router.register_tool(info.name.clone(), Arc::new(McpTool::new(info, Arc::clone(&client))));
    }

    info!(server = %client.server_name(), count = names.len(), "Registered tool-server tools");
    Ok(names)
}
