//! Registry and router of named units.
//!
//! A router is an explicitly constructed value owned by whoever drives the
//! session; there is no global registry. Registration is the only mutation
//! and lookups never block each other, so one `Arc<Router>` can be shared
//! by every in-flight call.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::envelope::{Category, Request};
use crate::error::RouterError;
use crate::event::{DomainEvent, EventBus};
use crate::response::Response;
use crate::tool::{Tool, ToolDefinition};
use crate::unit::Unit;

/// What a name resolved to.
#[derive(Clone)]
pub enum Resolved {
    Agent(Arc<dyn Unit>),
    Tool(Arc<dyn Tool>),
}

/// Name -> unit registry with a designated master.
#[derive(Default)]
pub struct Router {
    agents: DashMap<String, Arc<dyn Unit>>,
    tools: DashMap<String, Arc<dyn Tool>>,
    master: OnceLock<String>,
    event_bus: Option<Arc<EventBus>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish call events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Finish construction and share the router.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Register an agent under `name`. The first unit that declares itself
    /// master becomes the session entry point.
    pub fn register(&self, name: impl Into<String>, unit: Arc<dyn Unit>) {
        let name = name.into();
        let is_master = unit.is_master() && self.master.set(name.clone()).is_ok();
        if unit.is_master() && !is_master {
            debug!(unit = %name, "Master already set, ignoring master flag");
        }
        info!(unit = %name, is_master, "Registered unit");
        self.agents.insert(name.clone(), unit);
        self.publish(DomainEvent::UnitRegistered {
            name,
            is_tool: false,
            is_master,
            timestamp: Utc::now(),
        });
    }

    /// Register a tool under `name`.
    pub fn register_tool(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        info!(tool = %name, "Registered tool");
        self.tools.insert(name.clone(), tool);
        self.publish(DomainEvent::UnitRegistered {
            name,
            is_tool: true,
            is_master: false,
            timestamp: Utc::now(),
        });
    }

    /// Resolve a name, agents first.
    pub fn resolve(&self, name: &str) -> Result<Resolved, RouterError> {
        if let Some(unit) = self.agent(name) {
            return Ok(Resolved::Agent(unit));
        }
        self.tool(name)
            .map(Resolved::Tool)
            .ok_or_else(|| RouterError::NotFound(name.to_string()))
    }

    pub fn agent(&self, name: &str) -> Option<Arc<dyn Unit>> {
        self.agents.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name) || self.tools.contains_key(name)
    }

    pub fn master_name(&self) -> Option<&str> {
        self.master.get().map(String::as_str)
    }

    /// Description of a registered agent or tool.
    pub fn describe(&self, name: &str) -> Option<String> {
        match self.resolve(name).ok()? {
            Resolved::Agent(unit) => Some(unit.description().to_string()),
            Resolved::Tool(tool) => Some(tool.description().to_string()),
        }
    }

    /// Tool definition for `name`, if it is a registered tool.
    pub fn tool_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tool(name).map(|tool| tool.to_definition())
    }

    /// Registered agent names, sorted.
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Run a user request on the master unit.
    pub async fn dispatch_to_master(
        self: &Arc<Self>,
        mut request: Request,
    ) -> Result<Response, RouterError> {
        let master_name = self
            .master_name()
            .ok_or_else(|| RouterError::IllegalState("no master unit registered".into()))?
            .to_string();
        let master = self.agent(&master_name).ok_or_else(|| {
            RouterError::IllegalState(format!("master unit '{master_name}' is not an agent"))
        })?;

        request.target = master_name.clone();
        request.callee_category = Category::Agent;
        request.call_stack.push(master_name.clone());
        request.node_id_stack.push(request.father_node_id.clone());
        if request.root_trace_ids.is_empty() {
            request.root_trace_ids.push(request.trace_id.clone());
        }
        request.router = Some(Arc::clone(self));

        info!(master = %master_name, trace_id = %request.trace_id, "Dispatching to master");
        Ok(master.execute(request).await)
    }

    /// Call any registered unit on behalf of the user.
    ///
    /// Goes through the same chokepoint as nested calls; the user is exempt
    /// from permission checks but timeouts still apply.
    pub async fn dispatch(self: &Arc<Self>, name: &str, request: Request) -> Response {
        let arguments = request.arguments.clone();
        request.with_router(Arc::clone(self)).call(name, arguments).await
    }

    pub(crate) fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("agents", &self.agent_names())
            .field("tools", &self.tool_names())
            .field("master", &self.master_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitPolicy;
    use async_trait::async_trait;

    struct Named {
        name: &'static str,
        master: bool,
        policy: UnitPolicy,
    }

    impl Named {
        fn new(name: &'static str, master: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                master,
                policy: UnitPolicy::default(),
            })
        }
    }

    #[async_trait]
    impl Unit for Named {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "test unit"
        }
        fn is_master(&self) -> bool {
            self.master
        }
        fn policy(&self) -> &UnitPolicy {
            &self.policy
        }
        async fn execute(&self, request: Request) -> Response {
            Response::completed(format!("{} handled {}", self.name, request.query))
                .with_request(request)
        }
    }

    #[test]
    fn resolve_unknown_name_is_not_found() {
        let router = Router::new();
        assert!(matches!(router.resolve("ghost"), Err(RouterError::NotFound(n)) if n == "ghost"));
    }

    #[test]
    fn first_master_wins() {
        let router = Router::new();
        router.register("a", Named::new("a", true));
        router.register("b", Named::new("b", true));
        assert_eq!(router.master_name(), Some("a"));
        assert_eq!(router.agent_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn dispatch_without_master_is_illegal_state() {
        let router = Router::new().into_shared();
        router.register("worker", Named::new("worker", false));
        let err = router.dispatch_to_master(Request::new("hi")).await.unwrap_err();
        assert!(matches!(err, RouterError::IllegalState(_)));
    }

    #[tokio::test]
    async fn dispatch_to_master_attaches_router_and_target() {
        let router = Router::new().into_shared();
        router.register("master", Named::new("master", true));
        let response = router.dispatch_to_master(Request::new("hi")).await.unwrap();
        assert!(response.is_completed());
        assert_eq!(response.output, "master handled hi");

        let request = response.request.unwrap();
        assert_eq!(request.target, "master");
        assert_eq!(request.caller, "user");
        assert_eq!(request.call_stack, vec!["user", "master"]);
        assert!(request.router().is_some());
    }

    #[tokio::test]
    async fn registration_publishes_events() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let router = Router::new().with_event_bus(bus);
        router.register("master", Named::new("master", true));
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::UnitRegistered { name, is_master, .. } => {
                assert_eq!(name, "master");
                assert!(is_master);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
