//! Transcript: the reasoning scratchpad of one reactive loop.
//!
//! Each round pairs the model's raw reply (the thought) with what the
//! runtime observed after acting on it. The transcript is:
//!
//! - **Request-scoped**: built fresh for every `execute`
//! - **Serializable**: exported into `Response::extra["transcript"]`
//! - **Renderable**: replayed to the model as alternating chat turns

use agentweave_core::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Data Structures ───────────────────────────────────────────────────────

/// One thought/observation pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub thought: String,
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered rounds of a single loop run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    rounds: Vec<Round>,
}

// ── Implementation ────────────────────────────────────────────────────────

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a round.
    pub fn record(&mut self, thought: impl Into<String>, observation: impl Into<String>) {
        self.rounds.push(Round {
            thought: thought.into(),
            observation: observation.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Build the prompt for the next model turn: system, the user query,
    /// then every prior round as an assistant reply followed by a user
    /// message carrying the observation.
    pub fn messages(&self, system: &str, query: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + self.rounds.len() * 2);
        messages.push(ChatMessage::system(system));
        messages.push(ChatMessage::user(query));
        for round in &self.rounds {
            messages.push(ChatMessage::assistant(&round.thought));
            messages.push(ChatMessage::user(format!("Observation: {}", round.observation)));
        }
        messages
    }

    /// JSON export for response metadata.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.rounds).unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
