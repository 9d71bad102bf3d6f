//! Parallel fan-out pattern.
//!
//! # Architecture
//!
//! ```text
//!         query
//!           │
//!           ▼
//!   ┌───────────────┐   one parallel_id, one parallel_dict
//!   │   Parallel    │──────────────┬──────────────┐
//!   └───────────────┘              │              │
//!           │                      │              │
//!           ▼                      ▼              ▼
//!       ┌──────┐               ┌──────┐       ┌──────┐
//!       │  a   │               │  b   │       │  c   │
//!       └──┬───┘               └──┬───┘       └──┬───┘
//!          └───────── join ───────┴──────────────┘
//!                      │
//!                      ▼
//!            model summary (or raw results)
//! ```
//!
//! Branches are the unit's permitted names. Every branch runs in its own
//! task through the dispatch chokepoint; a failed branch never aborts the
//! group. Results are aggregated in declaration order.

use agentweave_core::{
    AgentState, ChatMessage, LanguageModel, Request, Response, SharedMap, Unit,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::profile::{profile_builders, unit_identity, Profile};

/// Runs every permitted unit concurrently and summarises the results.
pub struct ParallelAgent {
    profile: Profile,
    model: Option<Arc<dyn LanguageModel>>,
}

impl ParallelAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            profile: Profile::new(name),
            model: None,
        }
    }

    /// Fan out to `names`. They also become this unit's call allowlist.
    pub fn with_branches<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profile.policy = std::mem::take(&mut self.profile.policy).restricted_to(names);
        self
    }

    /// Model used for the summary. Without one the raw results are returned.
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    async fn summarise(&self, query: &str, results: &str) -> Option<String> {
        let model = self.model.as_ref()?;
        let messages = [
            ChatMessage::system(format!(
                "You are a helpful assistant. The user's question is: {query}\n\
                 Please summarize the results of the parallel execution of the above tasks."
            )),
            ChatMessage::user(results),
        ];
        match model.try_chat(&messages).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(unit = %self.profile.name, error = %e, "Summary failed, returning raw results");
                None
            }
        }
    }
}

profile_builders!(ParallelAgent);

/// `The parallel results are as following:\n1. ...\n2. ...`
fn aggregate(outputs: &[(String, Response)]) -> String {
    let mut text = String::from("The parallel results are as following:");
    for (i, (_, response)) in outputs.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, response.output));
    }
    text
}

#[async_trait]
impl Unit for ParallelAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let names = self.profile.policy.permitted_names.clone();
        if names.is_empty() {
            warn!(unit = %self.profile.name, "No branches to run");
            return Response::failed("No units to run in parallel").with_request(request);
        }

        let mut group = request.clone();
        group.parallel_id = Uuid::new_v4().to_string();
        group.parallel_dict = SharedMap::new();
        let parallel_id = group.parallel_id.clone();

        info!(unit = %self.profile.name, %parallel_id, branches = names.len(), "Fanning out");

        let handles = names.iter().map(|name| {
            let group = group.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let arguments = group.arguments.clone();
                group.call_with_retry(&name, arguments).await
            })
        });

        let outputs: Vec<(String, Response)> = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| {
                let response = joined.unwrap_or_else(|e| {
                    warn!(branch = %name, error = %e, "Branch task aborted");
                    Response::failed(format!("Branch '{name}' aborted: {e}"))
                });
                debug!(branch = %name, state = %response.state, "Branch finished");
                (name, response)
            })
            .collect();

        request.mark_latest(
            outputs
                .iter()
                .filter(|(_, r)| r.is_completed())
                .filter_map(|(_, r)| r.request.as_ref().map(|child| child.node_id.clone())),
        );

        let results: Vec<serde_json::Value> = outputs
            .iter()
            .map(|(name, r)| json!({ "name": name, "state": r.state, "output": r.output }))
            .collect();
        let failed = outputs
            .iter()
            .filter(|(_, r)| r.state != AgentState::Completed)
            .count();

        let raw = aggregate(&outputs);
        let output = match self.summarise(&request.query, &raw).await {
            Some(summary) => summary,
            None => raw,
        };

        info!(unit = %self.profile.name, %parallel_id, failed, "Fan-out joined");
        Response::completed(output)
            .with_extra("parallel_id", parallel_id)
            .with_extra("results", results)
            .with_request(request)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
