//! Tool trait: units that act on the world without their own policy.
//!
//! Tools share the execution shape of [`Unit`](crate::unit::Unit) so that a
//! tool name resolves wherever an agent name does. They live in a separate
//! registry map and are always reached through the dispatcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::Request;
use crate::response::Response;

/// A tool definition rendered for a model choosing among tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub input_schema: serde_json::Value,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Execute the tool. `request.arguments` holds the call arguments.
    async fn execute(&self, request: Request) -> Response;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}
