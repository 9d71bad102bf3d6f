//! Domain event system.
//!
//! The dispatcher publishes an event for every call it routes. Observers
//! (audit logs, UIs, tests) subscribe without coupling to the strategies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::response::AgentState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A unit or tool was added to the registry
    UnitRegistered {
        name: String,
        is_tool: bool,
        is_master: bool,
        timestamp: DateTime<Utc>,
    },

    /// A nested call passed resolution and is about to execute
    CallDispatched {
        trace_id: String,
        from_trace_id: String,
        caller: String,
        callee: String,
        timestamp: DateTime<Utc>,
    },

    /// A nested call finished (any state other than skip/timeout)
    CallCompleted {
        trace_id: String,
        callee: String,
        state: AgentState,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A nested call was denied by the caller's allowlist
    CallSkipped {
        caller: String,
        callee: String,
        timestamp: DateTime<Utc>,
    },

    /// A nested call exceeded the callee's timeout
    CallTimedOut {
        trace_id: String,
        callee: String,
        timeout_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
