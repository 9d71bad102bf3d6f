//! Call responses and their lifecycle states.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::envelope::Request;

/// Execution state of one call node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Created,
    Running,
    Completed,
    Failed,
    Paused,
    /// Policy denial. Terminal, never retried.
    Skipped,
    Canceled,
}

impl AgentState {
    /// Whether the node will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Completed | AgentState::Failed | AgentState::Skipped | AgentState::Canceled
        )
    }

    /// Only failures are eligible for a caller-side retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentState::Failed)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Created => "CREATED",
            AgentState::Running => "RUNNING",
            AgentState::Completed => "COMPLETED",
            AgentState::Failed => "FAILED",
            AgentState::Paused => "PAUSED",
            AgentState::Skipped => "SKIPPED",
            AgentState::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// The outcome of executing a request.
#[derive(Debug, Clone)]
pub struct Response {
    pub state: AgentState,
    pub output: String,
    /// Strategy-specific metadata (round counts, failure reasons, ...).
    pub extra: Map<String, Value>,
    /// The request this response answers, when known.
    pub request: Option<Request>,
}

impl Response {
    pub fn new(state: AgentState, output: impl Into<String>) -> Self {
        Self {
            state,
            output: output.into(),
            extra: Map::new(),
            request: None,
        }
    }

    pub fn completed(output: impl Into<String>) -> Self {
        Self::new(AgentState::Completed, output)
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self::new(AgentState::Failed, output)
    }

    pub fn skipped(output: impl Into<String>) -> Self {
        Self::new(AgentState::Skipped, output)
    }

    /// Attach a metadata entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Attach the originating request.
    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.state == AgentState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state == AgentState::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.state == AgentState::Skipped
    }

    /// The `reason` metadata tag, if the dispatcher set one.
    pub fn reason(&self) -> Option<&str> {
        self.extra.get("reason").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_is_terminal_but_not_retryable() {
        assert!(AgentState::Skipped.is_terminal());
        assert!(!AgentState::Skipped.is_retryable());
        assert!(AgentState::Failed.is_retryable());
        assert!(!AgentState::Running.is_terminal());
    }

    #[test]
    fn state_serializes_screaming_case() {
        let json = serde_json::to_string(&AgentState::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(AgentState::Skipped.to_string(), "SKIPPED");
    }

    #[test]
    fn extra_and_reason() {
        let response = Response::failed("boom").with_extra("reason", "timeout");
        assert!(response.is_failed());
        assert_eq!(response.reason(), Some("timeout"));
    }
}
