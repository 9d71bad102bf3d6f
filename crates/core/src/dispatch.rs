//! `call()`: the single policy-enforcement chokepoint.
//!
//! Every nested invocation goes through [`Request::call`]:
//!
//! 1. no router attached            -> FAILED (`no_router`)
//! 2. derive the child request      (see [`Request::clone_for`])
//! 3. unknown name                  -> FAILED (`not_found`)
//! 4. caller's allowlist denies it  -> SKIPPED (`permission_denied`)
//! 5. callee declares a timeout     -> race it; expiry -> FAILED (`timeout`)
//! 6. tools run through the tool contract with the call's arguments
//!
//! Failures never escape as errors; the caller always gets a [`Response`].

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::envelope::{Arguments, Category, Request};
use crate::event::DomainEvent;
use crate::response::Response;
use crate::router::{Resolved, Router};
use crate::unit::Unit;

/// Reason tags stored in `Response::extra["reason"]`.
pub mod reason {
    pub const NO_ROUTER: &str = "no_router";
    pub const NOT_FOUND: &str = "not_found";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const TIMEOUT: &str = "timeout";
    pub const PANICKED: &str = "panicked";
}

impl Request {
    /// Invoke the unit registered as `callee` from this node.
    pub async fn call(&self, callee: &str, arguments: Arguments) -> Response {
        let Some(router) = self.router.clone() else {
            warn!(callee, trace_id = %self.trace_id, "call() without a router");
            return Response::failed("No router attached to request")
                .with_extra("reason", reason::NO_ROUTER);
        };

        let mut child = self.clone_for(callee, arguments);

        let resolved = match router.resolve(callee) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(callee, caller = %child.caller, "Call target not found");
                return Response::failed(e.to_string())
                    .with_extra("reason", reason::NOT_FOUND)
                    .with_request(child);
            }
        };

        if !caller_permits(&router, &child, callee) {
            info!(caller = %child.caller, callee, "Call denied by caller allowlist");
            router.publish(DomainEvent::CallSkipped {
                caller: child.caller.clone(),
                callee: callee.to_string(),
                timestamp: Utc::now(),
            });
            return Response::skipped(format!("No permission to call: {callee}"))
                .with_extra("reason", reason::PERMISSION_DENIED)
                .with_request(child);
        }

        router.publish(DomainEvent::CallDispatched {
            trace_id: child.trace_id.clone(),
            from_trace_id: child.from_trace_id.clone(),
            caller: child.caller.clone(),
            callee: callee.to_string(),
            timestamp: Utc::now(),
        });
        debug!(caller = %child.caller, callee, depth = child.depth(), "Dispatching call");

        let trace_id = child.trace_id.clone();
        let node_id = child.node_id.clone();
        let started = Instant::now();
        let response = match resolved {
            Resolved::Tool(tool) => {
                child.callee_category = Category::Tool;
                tool.execute(child).await
            }
            Resolved::Agent(unit) => match unit.timeout().filter(|t| !t.is_zero()) {
                Some(limit) => execute_with_timeout(&router, unit, child, limit).await,
                None => unit.execute(child).await,
            },
        };

        if response.is_completed() {
            self.mark_latest([node_id]);
        }

        if response.reason() != Some(reason::TIMEOUT) {
            router.publish(DomainEvent::CallCompleted {
                trace_id,
                callee: callee.to_string(),
                state: response.state,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
        response
    }

    /// [`call`](Self::call) wrapped in the callee's declared retry policy.
    ///
    /// Only FAILED responses are retried, and never those caused by an
    /// unknown name or a missing router.
    pub async fn call_with_retry(&self, callee: &str, arguments: Arguments) -> Response {
        let (retries, delay) = self
            .router
            .as_ref()
            .and_then(|router| router.agent(callee))
            .map(|unit| (unit.retries(), unit.retry_delay()))
            .unwrap_or((0, Duration::ZERO));

        let mut attempt = 0u32;
        loop {
            let mut response = self.call(callee, arguments.clone()).await;
            let permanent = matches!(
                response.reason(),
                Some(reason::NOT_FOUND) | Some(reason::NO_ROUTER)
            );
            if !response.state.is_retryable() || permanent || attempt >= retries {
                if attempt > 0 {
                    response.extra.insert("attempts".into(), (attempt + 1).into());
                }
                return response;
            }
            attempt += 1;
            warn!(
                callee,
                attempt,
                retries,
                output = %response.output,
                "Call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Single-hop, caller-local permission check.
fn caller_permits(router: &Router, child: &Request, callee: &str) -> bool {
    if child.caller_category == Category::User {
        return true;
    }
    match router.agent(&child.caller) {
        Some(caller) => {
            !caller.permission_required() || caller.permitted_names().iter().any(|n| n == callee)
        }
        None => true,
    }
}

/// Run the unit in its own task so that a timeout leaves it running
/// detached instead of cancelling it mid-flight.
async fn execute_with_timeout(
    router: &Router,
    unit: Arc<dyn Unit>,
    child: Request,
    limit: Duration,
) -> Response {
    let callee = child.target.clone();
    let trace_id = child.trace_id.clone();
    let snapshot = child.clone();
    let handle = tokio::spawn(async move { unit.execute(child).await });

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(response)) => response,
        Ok(Err(join_error)) => {
            warn!(callee = %callee, error = %join_error, "Unit task aborted");
            Response::failed(format!("Unit execution aborted: {callee}: {join_error}"))
                .with_extra("reason", reason::PANICKED)
                .with_request(snapshot)
        }
        Err(_) => {
            warn!(callee = %callee, timeout_ms = limit.as_millis() as u64, "Unit execution timed out");
            router.publish(DomainEvent::CallTimedOut {
                trace_id,
                callee: callee.clone(),
                timeout_ms: limit.as_millis() as u64,
                timestamp: Utc::now(),
            });
            Response::failed(format!("Unit execution timed out: {callee}"))
                .with_extra("reason", reason::TIMEOUT)
                .with_request(snapshot)
        }
    }
}
