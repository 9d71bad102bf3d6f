//! Control-flow strategies for AgentWeave.
//!
//! Each strategy is an executable unit: register it on a router and it
//! drives nested calls through the dispatch chokepoint.
//!
//! 1. **Decide**: model replies become [`Decision`]s, plans and verdicts
//!    through the tiered parsers in [`decision`]
//! 2. **Act**: `request.call()` / `call_with_retry()` on the chosen unit
//! 3. **Observe**: results feed the next round ([`Transcript`], narrative)
//!
//! Exhaustion is a designed path: every loop is bounded and ends with a
//! best-effort COMPLETED or an explicit FAILED.

pub mod context;
pub mod decision;
pub mod patterns;
pub mod strategy;

pub use context::{Round, Transcript};
pub use decision::{
    extract_json, format_plan, parse_decision, parse_evaluation, parse_plan, parse_replan,
    plan_to_json, Decision, Evaluation, ReplanAction,
};
pub use patterns::{
    ChatAgent, KnowledgeRetriever, ParallelAgent, PlanAndSolveAgent, Profile, RagAgent,
    ReactAgent, ReflexionAgent, RemoteAgent, SseAnswerParser, WorkflowAgent, WorkflowFunction,
};
pub use strategy::Agent;
