//! Control-flow strategies.
//!
//! Every strategy is an executable unit that drives nested calls through
//! the router:
//!
//! 1. **ReAct**: decide, act, observe until the model answers
//! 2. **Plan-and-Solve**: plan once, execute steps, optionally replan
//! 3. **Reflexion**: worker drafts, reviewer critiques, worker revises
//! 4. **Parallel**: fan out to every permitted unit, join, summarise
//! 5. **Chat** / **RAG**: one model call, optionally grounded in retrieved text
//! 6. **Workflow**: user code orchestrating units directly
//! 7. **Remote**: proxy to an agent system served over SSE

pub mod chat;
pub mod parallel;
pub mod plan_and_solve;
pub mod profile;
pub mod rag;
pub mod react;
pub mod reflexion;
pub mod remote;
pub mod workflow;

pub use chat::{render_template, ChatAgent, SHORT_MEMORY_KEY};
pub use parallel::ParallelAgent;
pub use plan_and_solve::PlanAndSolveAgent;
pub use profile::Profile;
pub use rag::{KnowledgeRetriever, RagAgent};
pub use react::ReactAgent;
pub use reflexion::ReflexionAgent;
pub use remote::{RemoteAgent, SseAnswerParser};
pub use workflow::{WorkflowAgent, WorkflowFunction};

#[cfg(test)]
pub(crate) mod test_helpers;
