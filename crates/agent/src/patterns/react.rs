//! ReAct pattern: Decide → Act → Observe, repeated until an answer.
//!
//! ```text
//!            ┌──────────────┐
//!   query ──►│   DECIDING   │◄──────────────┐
//!            └──────┬───────┘               │
//!        answer     │     tool_call         │ observation
//!      ┌────────────┴────────────┐          │
//!      ▼                         ▼          │
//!   ┌──────┐               ┌──────────┐     │
//!   │ DONE │               │  ACTING  │─────┘
//!   └──────┘               └──────────┘
//!                    rounds spent ──► EXHAUSTED (FAILED)
//! ```
//!
//! Every round replays the full transcript. Tool calls go through
//! [`Request::call_with_retry`], so permission and timeout checks and the
//! callee's retry policy all apply. Malformed decisions are fed back as
//! observations rather than aborting the run.

use agentweave_core::{AgentState, LanguageModel, Request, Response, Router, Unit};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::Transcript;
use crate::decision::{parse_decision, Decision};

use super::profile::{profile_builders, unit_identity, Profile};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that solves tasks step by step.";

/// Reactive-loop agent.
pub struct ReactAgent {
    profile: Profile,
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
    sub_agents: Vec<String>,
    tools: Vec<String>,
    max_rounds: usize,
}

impl ReactAgent {
    pub fn new(name: impl Into<String>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            profile: Profile::new(name),
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            sub_agents: Vec::new(),
            tools: Vec::new(),
            max_rounds: 10,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Agents this loop may delegate to.
    pub fn with_sub_agents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_agents = names.into_iter().map(Into::into).collect();
        self
    }

    /// Tools this loop may call.
    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = names.into_iter().map(Into::into).collect();
        self
    }

    /// The loop runs at most `max + 1` rounds.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Restrict nested calls to the declared sub-agents and tools.
    pub fn restricted(mut self) -> Self {
        self.profile.policy = self
            .profile
            .policy
            .restricted_to(self.sub_agents.iter().chain(self.tools.iter()).cloned());
        self
    }

    fn declares(&self, name: &str) -> bool {
        self.sub_agents.iter().chain(self.tools.iter()).any(|n| n == name)
    }

    /// System instructions plus the catalogue of callable units and the
    /// reply format.
    fn build_system_prompt(&self, router: Option<&Router>) -> String {
        let describe = |name: &str| {
            router
                .and_then(|r| r.describe(name))
                .unwrap_or_default()
        };

        let mut prompt = self.system_prompt.clone();
        if !self.sub_agents.is_empty() {
            prompt.push_str("\n\nYou can delegate to these agents:");
            for name in &self.sub_agents {
                prompt.push_str(&format!("\n- {name}: {}", describe(name)));
            }
        }
        if !self.tools.is_empty() {
            prompt.push_str("\n\nYou can use these tools:");
            for name in &self.tools {
                let schema = router
                    .and_then(|r| r.tool_definition(name))
                    .map(|d| d.input_schema.to_string())
                    .unwrap_or_else(|| "{}".into());
                prompt.push_str(&format!("\n- {name}: {} (arguments: {schema})", describe(name)));
            }
        }
        prompt.push_str(
            "\n\nTo call an agent or tool, reply with JSON only:\n\
             {\"type\": \"tool_call\", \"tool_name\": \"<name>\", \"arguments\": {\"query\": \"...\"}}\n\
             When you know the final answer, reply with:\n\
             {\"type\": \"answer\", \"content\": \"<answer>\"}",
        );
        prompt
    }
}

profile_builders!(ReactAgent);

fn observe(name: &str, response: &Response) -> String {
    match response.state {
        AgentState::Completed => format!("Tool: {name}, Result: {}", response.output),
        AgentState::Skipped => format!("No permission to call {name}: {}", response.output),
        _ => format!("Error calling {name}: {}", response.output),
    }
}

#[async_trait]
impl Unit for ReactAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let system = self.build_system_prompt(request.router().map(Arc::as_ref));
        let mut transcript = Transcript::new();

        info!(unit = %self.profile.name, trace_id = %request.trace_id, max_rounds = self.max_rounds, "ReAct loop starting");

        for round in 0..=self.max_rounds {
            let reply = self
                .model
                .chat(&transcript.messages(&system, &request.query))
                .await;

            match parse_decision(&reply, &self.sub_agents) {
                Decision::Answer(content) => {
                    info!(unit = %self.profile.name, round, observations = transcript.len(), "ReAct loop answered");
                    return Response::completed(content)
                        .with_extra("rounds", round + 1)
                        .with_extra("observations", transcript.len())
                        .with_extra("transcript", transcript.to_json())
                        .with_request(request);
                }
                Decision::ToolCall { name, arguments } => {
                    if !self.declares(&name) {
                        warn!(unit = %self.profile.name, tool = %name, "Model chose an undeclared unit");
                        transcript.record(
                            reply,
                            format!("Error: '{name}' is not an available agent or tool"),
                        );
                        continue;
                    }
                    debug!(unit = %self.profile.name, round, tool = %name, "Acting");
                    let response = request.call_with_retry(&name, arguments).await;
                    transcript.record(reply, observe(&name, &response));
                }
                Decision::Malformed(reason) => {
                    warn!(unit = %self.profile.name, round, %reason, "Malformed decision");
                    transcript.record(
                        reply,
                        format!("Error: invalid reply ({reason}). Reply with the JSON format described above."),
                    );
                }
            }
        }

        warn!(unit = %self.profile.name, rounds = self.max_rounds + 1, "ReAct loop exhausted");
        Response::failed(format!(
            "No answer after {} rounds",
            self.max_rounds + 1
        ))
        .with_extra("rounds", self.max_rounds + 1)
        .with_extra("observations", transcript.len())
        .with_extra("transcript", transcript.to_json())
        .with_request(request)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_helpers::{router_with, ScriptedModel, ScriptedUnit};
    use agentweave_core::{AgentState, Role, UnitPolicy};

    const CALL_SEARCH: &str =
        r#"{"type": "tool_call", "tool_name": "search", "arguments": {"query": "rust"}}"#;

    fn answer(text: &str) -> String {
        format!(r#"{{"type": "answer", "content": "{text}"}}"#)
    }

    #[tokio::test]
    async fn k_tool_calls_then_answer_records_k_observations() {
        let final_answer = answer("done");
        let model = ScriptedModel::new(&[CALL_SEARCH, CALL_SEARCH, CALL_SEARCH, final_answer.as_str()]);
        let search = ScriptedUnit::replying("search", "hits");
        let agent = ReactAgent::new("react", model.clone())
            .with_sub_agents(["search"])
            .with_max_rounds(5);
        let router = router_with(vec![search.clone(), Arc::new(agent)]);

        let response = router.dispatch("react", Request::new("find rust")).await;

        assert_eq!(response.state, AgentState::Completed);
        assert_eq!(response.output, "done");
        assert_eq!(response.extra["rounds"], 4);
        assert_eq!(response.extra["observations"], 3);
        assert_eq!(search.calls(), 3);
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn never_answering_fails_after_max_plus_one_rounds() {
        let model = ScriptedModel::new(&[CALL_SEARCH; 4]);
        let agent = ReactAgent::new("react", model.clone())
            .with_tools(["search"])
            .with_max_rounds(3);
        let router = router_with(vec![
            ScriptedUnit::replying("search", "hits"),
            Arc::new(agent),
        ]);

        let response = router.dispatch("react", Request::new("loop")).await;

        assert_eq!(response.state, AgentState::Failed);
        assert_eq!(response.extra["rounds"], 4);
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn transcript_is_replayed_every_round() {
        let final_answer = answer("ok");
        let model = ScriptedModel::new(&[CALL_SEARCH, final_answer.as_str()]);
        let agent = ReactAgent::new("react", model.clone()).with_sub_agents(["search"]);
        let router = router_with(vec![
            ScriptedUnit::replying("search", "three results"),
            Arc::new(agent),
        ]);

        router.dispatch("react", Request::new("q")).await;

        let second = model.prompt(1);
        assert_eq!(second.len(), 4);
        assert_eq!(second[0].role, Role::System);
        assert!(second[0].content.contains("- search: scripted test unit"));
        assert_eq!(second[2].content, CALL_SEARCH);
        assert_eq!(second[3].content, "Observation: Tool: search, Result: three results");
    }

    #[tokio::test]
    async fn skipped_and_failed_calls_become_observations() {
        let write = r#"{"type": "tool_call", "tool_name": "write_file", "arguments": {}}"#;
        let read = r#"{"type": "tool_call", "tool_name": "read_file", "arguments": {}}"#;
        let final_answer = answer("gave up");
        let model = ScriptedModel::new(&[write, read, final_answer.as_str()]);
        let agent = ReactAgent::new("react", model.clone())
            .with_tools(["read_file", "write_file"])
            .with_policy(UnitPolicy::default().restricted_to(["read_file"]));
        let router = router_with(vec![
            ScriptedUnit::replying("write_file", "written"),
            ScriptedUnit::failing("read_file", "disk error"),
            Arc::new(agent),
        ]);

        let response = router.dispatch("react", Request::new("q")).await;

        assert_eq!(response.state, AgentState::Completed);
        let last = model.prompt(2);
        assert!(last[3].content.starts_with("Observation: No permission to call write_file"));
        assert_eq!(last[5].content, "Observation: Error calling read_file: disk error");
    }

    #[tokio::test]
    async fn undeclared_and_malformed_decisions_are_recoverable() {
        let undeclared = r#"{"type": "tool_call", "tool_name": "rm_rf", "arguments": {}}"#;
        let malformed = r#"{"type": "tool_call", "arguments": {}}"#;
        let final_answer = answer("fine");
        let model = ScriptedModel::new(&[undeclared, malformed, final_answer.as_str()]);
        let agent = ReactAgent::new("react", model.clone()).with_tools(["search"]);
        let router = router_with(vec![Arc::new(agent)]);

        let response = router.dispatch("react", Request::new("q")).await;

        assert_eq!(response.output, "fine");
        assert_eq!(response.extra["observations"], 2);
        let last = model.prompt(2);
        assert!(last[3].content.contains("'rm_rf' is not an available"));
        assert!(last[5].content.contains("tool_call without tool_name"));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_answer() {
        let agent = ReactAgent::new("react", ScriptedModel::failing());
        let router = router_with(vec![Arc::new(agent)]);

        let response = router.dispatch("react", Request::new("q")).await;

        assert_eq!(response.state, AgentState::Completed);
        assert!(response.output.starts_with("Model call failed"));
    }

    #[tokio::test]
    async fn restricted_limits_calls_to_declared_names() {
        let agent = ReactAgent::new("react", ScriptedModel::new(&[]))
            .with_sub_agents(["a"])
            .with_tools(["t"])
            .restricted();
        assert!(agent.policy().permission_required);
        assert_eq!(agent.policy().permitted_names, vec!["a", "t"]);
    }
}
