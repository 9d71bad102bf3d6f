//! Workflow units: user code in place of a model.
//!
//! The function receives the request (router attached) and may orchestrate
//! other units itself through `request.call()`.

use agentweave_core::{Error, Request, Response, Unit};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use super::profile::{profile_builders, unit_identity, Profile};

/// Async body of a workflow unit.
#[async_trait]
pub trait WorkflowFunction: Send + Sync {
    async fn run(&self, request: Request) -> Result<String, Error>;
}

#[async_trait]
impl<F, Fut> WorkflowFunction for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, Error>> + Send + 'static,
{
    async fn run(&self, request: Request) -> Result<String, Error> {
        self(request).await
    }
}

/// Runs a [`WorkflowFunction`]. `Ok` completes, `Err` fails.
pub struct WorkflowAgent {
    profile: Profile,
    function: Arc<dyn WorkflowFunction>,
}

impl WorkflowAgent {
    pub fn new(name: impl Into<String>, function: Arc<dyn WorkflowFunction>) -> Self {
        Self {
            profile: Profile::new(name),
            function,
        }
    }
}

profile_builders!(WorkflowAgent);

#[async_trait]
impl Unit for WorkflowAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let echo = request.clone();
        match self.function.run(request).await {
            Ok(output) => Response::completed(output).with_request(echo),
            Err(e) => {
                warn!(unit = %self.profile.name, error = %e, "Workflow failed");
                Response::failed(e.to_string()).with_request(echo)
            }
        }
    }
}
