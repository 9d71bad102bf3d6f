//! The Executable Unit contract.
//!
//! Every agent strategy implements [`Unit`]. Policy (permissions, timeout,
//! retries) is *declared* here and *enforced* by the dispatcher and by loop
//! drivers, never by the unit itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::envelope::Request;
use crate::response::Response;

/// Declared call policy of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPolicy {
    /// When true, nested calls made *by* this unit are restricted to
    /// `permitted_names`.
    #[serde(default)]
    pub permission_required: bool,

    #[serde(default)]
    pub permitted_names: Vec<String>,

    /// Upper bound on one execution of this unit. `None` = unbounded.
    #[serde(default)]
    pub timeout: Option<Duration>,

    /// How many times a caller retries this unit after FAILED.
    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

impl Default for UnitPolicy {
    fn default() -> Self {
        Self {
            permission_required: false,
            permitted_names: Vec::new(),
            timeout: None,
            retries: 0,
            retry_delay: default_retry_delay(),
        }
    }
}

impl UnitPolicy {
    /// Restrict nested calls to `names`.
    pub fn restricted_to<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission_required = true;
        self.permitted_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the execution timeout in seconds. Zero, or a value too large
    /// for a `Duration`, means unbounded.
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = if secs > 0.0 {
            Duration::try_from_secs_f64(secs).ok()
        } else {
            None
        };
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Whether a unit with this policy may call `callee`.
    pub fn permits(&self, callee: &str) -> bool {
        !self.permission_required || self.permitted_names.iter().any(|n| n == callee)
    }
}

/// The capability shared by every agent.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Registry name of this unit.
    fn name(&self) -> &str;

    /// What this unit does (shown to models choosing among units).
    fn description(&self) -> &str;

    /// Whether this unit is the session entry point.
    fn is_master(&self) -> bool {
        false
    }

    /// Declared call policy. Defaults to unrestricted, unbounded, no retries.
    fn policy(&self) -> &UnitPolicy;

    /// Execute one request. May issue nested `request.call(..)`s.
    async fn execute(&self, request: Request) -> Response;

    fn permission_required(&self) -> bool {
        self.policy().permission_required
    }

    fn permitted_names(&self) -> &[String] {
        &self.policy().permitted_names
    }

    fn timeout(&self) -> Option<Duration> {
        self.policy().timeout
    }

    fn retries(&self) -> u32 {
        self.policy().retries
    }

    fn retry_delay(&self) -> Duration {
        self.policy().retry_delay
    }
}
