//! Reflexion pattern: a worker drafts, a reviewer critiques, the worker
//! revises.
//!
//! Each round asks the worker for a candidate, then asks the reviewer
//! whether it is satisfactory. An unsatisfactory verdict rewrites the
//! query with the reviewer's feedback and the previous answer. Running out
//! of rounds is not a failure: the last candidate is returned with
//! `reached_max_rounds = true`.

use agentweave_core::{query_args, Request, Response, Unit};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::decision::{parse_evaluation, Evaluation};

use super::profile::{profile_builders, unit_identity, Profile};

const EVALUATION_TEMPLATE: &str = "\
Evaluate the quality of the answer below.

Original question: {query}

Answer: {answer}

Consider whether the answer is accurate, whether it fully addresses the question, and whether it is clear.

Reply in this format:
- is_satisfactory: true or false
- evaluation_reason: <why>
- improvement_suggestions: <what to change, if anything>";

const IMPROVEMENT_TEMPLATE: &str = "\
{original_query}

Your previous answer was judged insufficient. Improve it using this feedback:
{improvement_suggestions}

Previous answer:
{previous_answer}";

/// Worker/reviewer refinement loop.
pub struct ReflexionAgent {
    profile: Profile,
    worker: String,
    reviewer: String,
    max_rounds: usize,
    evaluation_template: String,
    improvement_template: String,
}

impl ReflexionAgent {
    pub fn new(
        name: impl Into<String>,
        worker: impl Into<String>,
        reviewer: impl Into<String>,
    ) -> Self {
        Self {
            profile: Profile::new(name),
            worker: worker.into(),
            reviewer: reviewer.into(),
            max_rounds: 3,
            evaluation_template: EVALUATION_TEMPLATE.into(),
            improvement_template: IMPROVEMENT_TEMPLATE.into(),
        }
    }

    /// The worker is invoked at most `max + 1` times.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Override the review prompt. Placeholders: `{query}`, `{answer}`.
    pub fn with_evaluation_template(mut self, template: impl Into<String>) -> Self {
        self.evaluation_template = template.into();
        self
    }

    /// Override the revision prompt. Placeholders: `{original_query}`,
    /// `{improvement_suggestions}`, `{previous_answer}`.
    pub fn with_improvement_template(mut self, template: impl Into<String>) -> Self {
        self.improvement_template = template.into();
        self
    }

    fn evaluation_prompt(&self, query: &str, answer: &str) -> String {
        self.evaluation_template
            .replace("{query}", query)
            .replace("{answer}", answer)
    }

    fn improvement_prompt(&self, query: &str, evaluation: &Evaluation, answer: &str) -> String {
        self.improvement_template
            .replace("{original_query}", query)
            .replace("{improvement_suggestions}", evaluation.feedback())
            .replace("{previous_answer}", answer)
    }
}

profile_builders!(ReflexionAgent);

fn evaluation_json(evaluation: &Evaluation) -> serde_json::Value {
    serde_json::to_value(evaluation).unwrap_or_default()
}

#[async_trait]
impl Unit for ReflexionAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let original = request.query.clone();
        let mut query = original.clone();
        let mut answer = String::new();
        let mut evaluation = Evaluation::default();

        for round in 0..=self.max_rounds {
            let draft = request.call_with_retry(&self.worker, query_args(query.clone())).await;
            if !draft.is_completed() {
                warn!(unit = %self.profile.name, round, state = %draft.state, "Worker failed");
                return Response::failed(format!("Worker '{}' {}: {}", self.worker, draft.state, draft.output))
                    .with_extra("reflexion_rounds", round + 1)
                    .with_request(request);
            }
            answer = draft.output;

            let review = request
                .call_with_retry(&self.reviewer, query_args(self.evaluation_prompt(&original, &answer)))
                .await;
            if !review.is_completed() {
                warn!(unit = %self.profile.name, round, state = %review.state, "Reviewer failed, keeping current answer");
                return Response::completed(answer)
                    .with_extra("reflexion_rounds", round + 1)
                    .with_extra("reviewer_failed", true)
                    .with_request(request);
            }

            evaluation = parse_evaluation(&review.output);
            debug!(unit = %self.profile.name, round, satisfactory = evaluation.is_satisfactory, "Reviewed");
            if evaluation.is_satisfactory {
                info!(unit = %self.profile.name, rounds = round + 1, "Answer accepted");
                return Response::completed(answer)
                    .with_extra("reflexion_rounds", round + 1)
                    .with_extra("final_evaluation", evaluation_json(&evaluation))
                    .with_extra("reached_max_rounds", false)
                    .with_request(request);
            }

            if round < self.max_rounds {
                query = self.improvement_prompt(&original, &evaluation, &answer);
            }
        }

        info!(unit = %self.profile.name, rounds = self.max_rounds + 1, "Reflexion rounds exhausted");
        Response::completed(answer)
            .with_extra("reflexion_rounds", self.max_rounds + 1)
            .with_extra("final_evaluation", evaluation_json(&evaluation))
            .with_extra("reached_max_rounds", true)
            .with_request(request)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
