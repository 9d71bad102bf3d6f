//! In-process tools backed by async closures.

use agentweave_core::{Arguments, Request, Response, Tool, ToolError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::warn;

type Handler = Box<dyn Fn(Arguments) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// A tool whose behaviour is a Rust closure over the call arguments.
pub struct FunctionTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({ "type": "object", "properties": {} }),
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Set the JSON Schema advertised for the arguments.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, request: Request) -> Response {
        match (self.handler)(request.arguments.clone()).await {
            Ok(output) => Response::completed(output).with_request(request),
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Function tool failed");
                Response::failed(e.to_string()).with_request(request)
            }
        }
    }
}
