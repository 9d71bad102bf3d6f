//! The closed set of strategies as one sum type.
//!
//! `Agent` lets configuration code hold any strategy by value and register
//! it without boxing each kind separately.

use agentweave_core::{Request, Response, Unit, UnitPolicy};
use async_trait::async_trait;
use std::sync::Arc;

use crate::patterns::{
    ChatAgent, ParallelAgent, PlanAndSolveAgent, RagAgent, ReactAgent, ReflexionAgent,
    RemoteAgent, WorkflowAgent,
};

/// Any built-in strategy.
pub enum Agent {
    React(ReactAgent),
    PlanAndSolve(PlanAndSolveAgent),
    Reflexion(ReflexionAgent),
    Parallel(ParallelAgent),
    Chat(ChatAgent),
    Rag(RagAgent),
    Workflow(WorkflowAgent),
    Remote(RemoteAgent),
}

impl Agent {
    /// Strategy name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Agent::React(_) => "react",
            Agent::PlanAndSolve(_) => "plan_and_solve",
            Agent::Reflexion(_) => "reflexion",
            Agent::Parallel(_) => "parallel",
            Agent::Chat(_) => "chat",
            Agent::Rag(_) => "rag",
            Agent::Workflow(_) => "workflow",
            Agent::Remote(_) => "remote",
        }
    }

    fn inner(&self) -> &dyn Unit {
        match self {
            Agent::React(a) => a,
            Agent::PlanAndSolve(a) => a,
            Agent::Reflexion(a) => a,
            Agent::Parallel(a) => a,
            Agent::Chat(a) => a,
            Agent::Rag(a) => a,
            Agent::Workflow(a) => a,
            Agent::Remote(a) => a,
        }
    }

    pub fn into_shared(self) -> Arc<dyn Unit> {
        Arc::new(self)
    }
}

#[async_trait]
impl Unit for Agent {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }

    fn is_master(&self) -> bool {
        self.inner().is_master()
    }

    fn policy(&self) -> &UnitPolicy {
        self.inner().policy()
    }

    async fn execute(&self, request: Request) -> Response {
        tracing::debug!(unit = %self.name(), kind = self.kind(), "Executing");
        self.inner().execute(request).await
    }
}

macro_rules! agent_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Agent {
                fn from(agent: $ty) -> Self {
                    Agent::$variant(agent)
                }
            }
        )*
    };
}

agent_from!(
    React(ReactAgent),
    PlanAndSolve(PlanAndSolveAgent),
    Reflexion(ReflexionAgent),
    Parallel(ParallelAgent),
    Chat(ChatAgent),
    Rag(RagAgent),
    Workflow(WorkflowAgent),
    Remote(RemoteAgent),
);
