//! Shared test doubles for strategy tests.

use agentweave_core::{
    AgentState, ChatMessage, LanguageModel, ProviderError, Request, Response, Router, Unit,
    UnitPolicy,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A model that replays scripted replies and records every prompt.
///
/// Panics if called more times than it has replies, unless built with
/// [`ScriptedModel::failing`].
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    always_fail: bool,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Self::with_results(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            always_fail: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails with a network error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            always_fail: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// The messages of call `index`.
    pub fn prompt(&self, index: usize) -> Vec<ChatMessage> {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn try_chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        if self.always_fail {
            return Err(ProviderError::Network("connection refused".into()));
        }
        let mut replies = self.replies.lock().unwrap();
        let count = self.seen.lock().unwrap().len();
        replies
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedModel: no more replies (call #{count})"))
    }
}

/// A unit that replays scripted `(state, output)` results, repeating the
/// last one when exhausted, and records the query of every call.
pub struct ScriptedUnit {
    name: String,
    policy: UnitPolicy,
    script: Mutex<VecDeque<(AgentState, String)>>,
    last: Mutex<(AgentState, String)>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedUnit {
    pub fn new(name: &str, script: &[(AgentState, &str)]) -> Arc<Self> {
        Self::build(name, script, None)
    }

    /// Always completes with `output`.
    pub fn replying(name: &str, output: &str) -> Arc<Self> {
        Self::new(name, &[(AgentState::Completed, output)])
    }

    /// Always fails with `output`.
    pub fn failing(name: &str, output: &str) -> Arc<Self> {
        Self::new(name, &[(AgentState::Failed, output)])
    }

    /// Completes with `output` after sleeping for `delay`.
    pub fn slow(name: &str, output: &str, delay: Duration) -> Arc<Self> {
        Self::build(name, &[(AgentState::Completed, output)], Some(delay))
    }

    /// Like [`ScriptedUnit::new`] but declaring `policy`.
    pub fn with_policy(name: &str, script: &[(AgentState, &str)], policy: UnitPolicy) -> Arc<Self> {
        let mut unit = Self::build(name, script, None);
        if let Some(unit) = Arc::get_mut(&mut unit) {
            unit.policy = policy;
        }
        unit
    }

    fn build(name: &str, script: &[(AgentState, &str)], delay: Option<Duration>) -> Arc<Self> {
        let script: VecDeque<_> = script.iter().map(|(s, o)| (*s, o.to_string())).collect();
        let last = script
            .back()
            .cloned()
            .unwrap_or((AgentState::Completed, String::new()));
        Arc::new(Self {
            name: name.into(),
            policy: UnitPolicy::default(),
            script: Mutex::new(script),
            last: Mutex::new(last),
            delay,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Unit for ScriptedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test unit"
    }

    fn policy(&self) -> &UnitPolicy {
        &self.policy
    }

    async fn execute(&self, request: Request) -> Response {
        self.queries.lock().unwrap().push(request.query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let (state, output) = {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(next) => {
                    *self.last.lock().unwrap() = next.clone();
                    next
                }
                None => self.last.lock().unwrap().clone(),
            }
        };
        Response::new(state, output).with_request(request)
    }
}

/// A router with `units` registered under their names.
pub fn router_with(units: Vec<Arc<dyn Unit>>) -> Arc<Router> {
    let router = Router::new().into_shared();
    for unit in units {
        router.register(unit.name().to_string(), unit);
    }
    router
}
