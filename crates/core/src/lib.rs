//! # AgentWeave Core
//!
//! The orchestration substrate of the AgentWeave runtime: the call envelope,
//! the router, the dispatch chokepoint and the contracts every unit, tool
//! and language model implements. Strategies and transports live in their
//! own crates and depend inward on this one.
//!
//! ## Flow
//!
//! A caller builds a [`Request`], hands it to a [`Router`], which dispatches
//! to a [`Unit`]. The unit may call `request.call(name, args)`, which clones
//! the envelope, re-enters the router and enforces permission and timeout
//! policy before invoking the target. Results come back as [`Response`]s;
//! failures and skips are states, not errors.

pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod response;
pub mod router;
pub mod shared;
pub mod tool;
pub mod unit;

// Re-export key types at crate root for ergonomics
pub use envelope::{query_args, Arguments, Category, NodeLayer, Request, USER};
pub use error::{Error, ProviderError, Result, RouterError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ChatMessage, Role};
pub use provider::{degraded_reply, LanguageModel};
pub use response::{AgentState, Response};
pub use router::{Resolved, Router};
pub use shared::SharedMap;
pub use tool::{Tool, ToolDefinition};
pub use unit::{Unit, UnitPolicy};
