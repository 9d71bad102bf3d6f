//! Language-model transports for AgentWeave.
//!
//! All models implement `agentweave_core::LanguageModel`.
//! The router builds them from configuration.

pub mod fallback;
pub mod openai_compat;
pub mod router;

pub use fallback::FallbackModel;
pub use openai_compat::OpenAiCompatModel;
pub use router::{build_from_config, ModelRouter};
