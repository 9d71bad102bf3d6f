//! Plan-and-Solve pattern: plan once, execute step by step, optionally
//! replan after every step.
//!
//! ```text
//!   query ─► planner (or preset steps) ─► [s1, s2, s3]
//!                                            │
//!              ┌─────────────────────────────┘
//!              ▼
//!         executor(s_head + narrative) ─► narrative += result
//!              │
//!              ├─ replanner says respond ─► COMPLETED
//!              ├─ replanner gives steps  ─► replace remaining steps
//!              └─ no replanner           ─► pop s_head
//!
//!   steps empty       ─► last executor response
//!   rounds exhausted  ─► model summary of the narrative, or the narrative
//! ```
//!
//! Executor failures never abort the run; they are recorded in the
//! narrative like any other result.

use agentweave_core::{query_args, ChatMessage, LanguageModel, Request, Response, Unit};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::decision::{format_plan, parse_plan, parse_replan, ReplanAction};

use super::profile::{profile_builders, unit_identity, Profile};

/// Plan, execute and replan.
pub struct PlanAndSolveAgent {
    profile: Profile,
    planner: Option<String>,
    executor: String,
    replanner: Option<String>,
    preset_steps: Vec<String>,
    max_replan_rounds: usize,
    model: Option<Arc<dyn LanguageModel>>,
}

impl PlanAndSolveAgent {
    pub fn new(name: impl Into<String>, executor: impl Into<String>) -> Self {
        Self {
            profile: Profile::new(name),
            planner: None,
            executor: executor.into(),
            replanner: None,
            preset_steps: Vec::new(),
            max_replan_rounds: 30,
            model: None,
        }
    }

    pub fn with_planner(mut self, planner: impl Into<String>) -> Self {
        self.planner = Some(planner.into());
        self
    }

    /// Enable replanning after every executed step.
    pub fn with_replanner(mut self, replanner: impl Into<String>) -> Self {
        self.replanner = Some(replanner.into());
        self
    }

    /// Skip the planning phase and use these steps verbatim.
    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preset_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_replan_rounds(mut self, max: usize) -> Self {
        self.max_replan_rounds = max;
        self
    }

    /// Model used to summarise the narrative when rounds run out.
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    async fn plan(&self, request: &Request) -> Result<Vec<String>, String> {
        if !self.preset_steps.is_empty() {
            return Ok(self.preset_steps.clone());
        }
        let Some(planner) = &self.planner else {
            return Err("No planner configured and no preset steps".into());
        };
        let response = request
            .call(planner, query_args(request.query.clone()))
            .await;
        if !response.is_completed() {
            return Err(format!("Planner '{planner}' {}: {}", response.state, response.output));
        }
        Ok(parse_plan(&response.output))
    }

    async fn summarise(&self, goal: &str, plan_text: &str, narrative: &str) -> Option<String> {
        let model = self.model.as_ref()?;
        let messages = [
            ChatMessage::system("Answer the user's question based on the plan and the results of its steps."),
            ChatMessage::user(summary_prompt(goal, plan_text, narrative)),
        ];
        match model.try_chat(&messages).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(unit = %self.profile.name, error = %e, "Summary failed, returning raw narrative");
                None
            }
        }
    }
}

profile_builders!(PlanAndSolveAgent);

// ── Prompts ───────────────────────────────────────────────────────────────

fn execute_prompt(narrative: &str, step: &str) -> String {
    let done = if narrative.is_empty() { "None" } else { narrative };
    format!(
        "We have finished the following steps: {done}\n\
         The current step to execute is: {step}\n\
         Complete the current step and reply with its result only."
    )
}

fn replan_prompt(goal: &str, plan_text: &str, narrative: &str) -> String {
    format!(
        "Your objective was this: {goal}\n\
         Your original plan was this:\n{plan_text}\n\
         You have currently done the following steps: {narrative}\n\n\
         Update the plan. If no more steps are needed and you can answer the objective, reply with \
         {{\"action\": {{\"response\": \"<answer>\"}}}}. Otherwise reply with the remaining steps only, as \
         {{\"action\": {{\"steps\": [\"...\"]}}}}. Do not repeat steps that are already done."
    )
}

fn summary_prompt(goal: &str, plan_text: &str, narrative: &str) -> String {
    format!(
        "Your objective was this: {goal}\n---\n\
         For the following plan:\n{plan_text}\n---\n\
         The results of the executed steps: {narrative}\n---\n\
         Give the final answer to the objective."
    )
}

#[async_trait]
impl Unit for PlanAndSolveAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let goal = request.query.clone();
        let mut steps = match self.plan(&request).await {
            Ok(steps) if steps.is_empty() => {
                warn!(unit = %self.profile.name, "Planning produced no steps");
                return Response::failed("Planning produced no steps").with_request(request);
            }
            Ok(steps) => steps,
            Err(reason) => {
                warn!(unit = %self.profile.name, %reason, "Planning failed");
                return Response::failed(reason).with_request(request);
            }
        };
        let plan_text = format_plan(&steps);
        info!(unit = %self.profile.name, steps = steps.len(), "Plan ready");

        let mut narrative = String::new();
        let mut executed = 0usize;

        for round in 0..=self.max_replan_rounds {
            let Some(step) = steps.first().cloned() else {
                break;
            };
            debug!(unit = %self.profile.name, round, %step, "Executing step");

            let last = request
                .call(&self.executor, query_args(execute_prompt(&narrative, &step)))
                .await;
            executed += 1;
            narrative.push_str(&format!("\ntask:{step}, execute task result:{}", last.output));

            match &self.replanner {
                Some(replanner) => {
                    let reply = request
                        .call(replanner, query_args(replan_prompt(&goal, &plan_text, &narrative)))
                        .await;
                    if reply.is_completed() {
                        match parse_replan(&reply.output) {
                            ReplanAction::Respond(answer) => {
                                info!(unit = %self.profile.name, executed, "Replanner answered");
                                return Response::completed(answer)
                                    .with_extra("steps_executed", executed)
                                    .with_request(request);
                            }
                            ReplanAction::Replan(remaining) => steps = remaining,
                        }
                    } else {
                        warn!(unit = %self.profile.name, state = %reply.state, "Replanner failed, continuing with the current plan");
                        steps.remove(0);
                    }
                }
                None => {
                    steps.remove(0);
                }
            }

            if steps.is_empty() {
                info!(unit = %self.profile.name, executed, state = %last.state, "All steps executed");
                return last.with_extra("steps_executed", executed);
            }
        }

        warn!(unit = %self.profile.name, pending = steps.len(), "Round budget exhausted");
        let output = match self.summarise(&goal, &plan_text, &narrative).await {
            Some(summary) => summary,
            None => narrative.trim_start().to_string(),
        };
        Response::completed(output)
            .with_extra("steps_executed", executed)
            .with_extra("reached_max_rounds", true)
            .with_extra("pending_steps", steps)
            .with_request(request)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
