//! Per-request reasoning state.

pub mod transcript;

pub use transcript::{Round, Transcript};
