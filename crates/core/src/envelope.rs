//! The call envelope: one node of a trace.
//!
//! A [`Request`] carries the query, routing identity, provenance chain and
//! the shared state of the session. Units never build child requests by
//! hand; [`Request::call`](crate::dispatch) derives them through
//! [`Request::clone_for`], which enforces the provenance rules:
//!
//! ```text
//!   parent (trace t1, node n1, target "planner")
//!      │  clone_for("search", args)
//!      ▼
//!   child  (trace t2, node n2, caller "planner", from_trace_id t1,
//!           father_node_id n1, call_stack [.., "search"],
//!           shared_data/group_data/parallel_dict: same instances)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::router::Router;
use crate::shared::SharedMap;

/// Node-local key/value arguments.
pub type Arguments = Map<String, Value>;

/// Name used for the end user in call stacks and caller fields.
pub const USER: &str = "user";

/// Whether a participant in a call is the end user or a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    User,
    Agent,
    Tool,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::User => "user",
            Category::Agent => "agent",
            Category::Tool => "tool",
        };
        f.write_str(s)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Node ids most recently completed from one node, shared by every clone
/// of that node.
#[derive(Debug, Clone, Default)]
pub struct NodeLayer(Arc<Mutex<Vec<String>>>);

impl NodeLayer {
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, node_ids: Vec<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = node_ids;
    }
}

/// One call node.
#[derive(Clone)]
pub struct Request {
    pub query: String,

    pub trace_id: String,
    pub from_trace_id: String,
    pub root_trace_ids: Vec<String>,

    pub caller: String,
    pub caller_category: Category,
    pub target: String,
    pub callee_category: Category,

    pub call_stack: Vec<String>,
    pub node_id_stack: Vec<String>,

    pub node_id: String,
    pub father_node_id: String,

    pub parallel_id: String,
    pub parallel_dict: SharedMap,

    /// The layer this node's parent had completed when it was derived.
    pub pre_node_ids: Vec<String>,
    pub(crate) latest_node_ids: NodeLayer,

    pub arguments: Arguments,
    /// Visible to every node of one trace.
    pub shared_data: SharedMap,
    /// Visible to every trace of one session (`group_id`).
    pub group_data: SharedMap,

    pub request_id: String,
    pub group_id: String,

    pub(crate) router: Option<Arc<Router>>,
}

impl Request {
    /// A request originating from the end user.
    ///
    /// The user owns this node: calls issued from it are exempt from
    /// permission checks. [`Router::dispatch_to_master`] retargets it at the
    /// master unit.
    pub fn new(query: impl Into<String>) -> Self {
        let trace_id = new_id();
        Self {
            query: query.into(),
            root_trace_ids: vec![trace_id.clone()],
            trace_id,
            from_trace_id: String::new(),
            caller: USER.into(),
            caller_category: Category::User,
            target: USER.into(),
            callee_category: Category::User,
            call_stack: vec![USER.into()],
            node_id_stack: vec![String::new()],
            node_id: new_id(),
            father_node_id: String::new(),
            parallel_id: String::new(),
            parallel_dict: SharedMap::new(),
            pre_node_ids: Vec::new(),
            latest_node_ids: NodeLayer::default(),
            arguments: Arguments::new(),
            shared_data: SharedMap::new(),
            group_data: SharedMap::new(),
            request_id: new_id(),
            group_id: new_id(),
            router: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Join an existing session so that `group_data` is shared with it.
    pub fn with_group(mut self, group_id: impl Into<String>, group_data: SharedMap) -> Self {
        self.group_id = group_id.into();
        self.group_data = group_data;
        self
    }

    pub fn with_router(mut self, router: Arc<Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// The router this request dispatches through, if attached.
    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    /// Derive the request for calling `callee` from this node.
    ///
    /// Fresh trace and node ids; the current target becomes the caller;
    /// stacks are extended on a copy; the three shared maps are shared by
    /// reference; `arguments` is replaced by `arguments`.
    pub fn clone_for(&self, callee: &str, arguments: Arguments) -> Request {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(callee.to_string());
        let mut node_id_stack = self.node_id_stack.clone();
        node_id_stack.push(self.node_id.clone());

        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.query.clone());

        let parallel_id = if self.parallel_id.is_empty() {
            new_id()
        } else {
            self.parallel_id.clone()
        };

        Request {
            query,
            trace_id: new_id(),
            from_trace_id: self.trace_id.clone(),
            root_trace_ids: self.root_trace_ids.clone(),
            caller: self.target.clone(),
            caller_category: self.callee_category,
            target: callee.to_string(),
            callee_category: Category::Agent,
            call_stack,
            node_id_stack,
            node_id: new_id(),
            father_node_id: self.node_id.clone(),
            parallel_id,
            parallel_dict: self.parallel_dict.clone(),
            pre_node_ids: self.latest_node_ids.snapshot(),
            latest_node_ids: NodeLayer::default(),
            arguments,
            shared_data: self.shared_data.clone(),
            group_data: self.group_data.clone(),
            request_id: self.request_id.clone(),
            group_id: self.group_id.clone(),
            router: self.router.clone(),
        }
    }

    /// Ids of the nodes most recently completed from this node.
    pub fn latest_node_ids(&self) -> Vec<String> {
        self.latest_node_ids.snapshot()
    }

    /// Replace this node's latest layer. Visible through every clone of it.
    pub fn mark_latest<I, S>(&self, node_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.latest_node_ids
            .replace(node_ids.into_iter().map(Into::into).collect());
    }

    /// Read a string argument.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Depth of this node below the user.
    pub fn depth(&self) -> usize {
        self.call_stack.len().saturating_sub(1)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("query", &self.query)
            .field("trace_id", &self.trace_id)
            .field("from_trace_id", &self.from_trace_id)
            .field("caller", &self.caller)
            .field("caller_category", &self.caller_category)
            .field("target", &self.target)
            .field("callee_category", &self.callee_category)
            .field("call_stack", &self.call_stack)
            .field("node_id", &self.node_id)
            .field("father_node_id", &self.father_node_id)
            .field("parallel_id", &self.parallel_id)
            .field("arguments", &self.arguments)
            .field("group_id", &self.group_id)
            .field("router_attached", &self.router.is_some())
            .finish()
    }
}

/// Build an argument map holding only a `query`.
pub fn query_args(query: impl Into<String>) -> Arguments {
    let mut args = Arguments::new();
    args.insert("query".into(), Value::String(query.into()));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parent() -> Request {
        let mut request = Request::new("plan a trip");
        request.target = "master".into();
        request.callee_category = Category::Agent;
        request.call_stack.push("master".into());
        request.arguments.insert("secret".into(), json!("parent-only"));
        request.mark_latest(["prev"]);
        request
    }

    #[test]
    fn clone_assigns_fresh_identity_and_links_parent() {
        let parent = parent();
        let child = parent.clone_for("search", query_args("find flights"));

        assert_ne!(child.trace_id, parent.trace_id);
        assert_ne!(child.node_id, parent.node_id);
        assert_eq!(child.from_trace_id, parent.trace_id);
        assert_eq!(child.father_node_id, parent.node_id);
        assert_eq!(child.root_trace_ids, parent.root_trace_ids);
        assert_eq!(child.pre_node_ids, vec!["prev".to_string()]);
        assert_eq!(child.group_id, parent.group_id);
        assert_eq!(child.request_id, parent.request_id);
    }

    #[test]
    fn clone_makes_parent_target_the_caller() {
        let parent = parent();
        let child = parent.clone_for("search", Arguments::new());
        assert_eq!(child.caller, parent.target);
        assert_eq!(child.caller_category, Category::Agent);
        assert_eq!(child.target, "search");
    }

    #[test]
    fn clone_appends_to_copied_stacks() {
        let parent = parent();
        let child = parent.clone_for("search", Arguments::new());
        assert_eq!(parent.call_stack, vec!["user", "master"]);
        assert_eq!(child.call_stack, vec!["user", "master", "search"]);
        assert_eq!(child.node_id_stack.len(), parent.node_id_stack.len() + 1);
        assert_eq!(child.node_id_stack.last(), Some(&parent.node_id));
    }

    #[test]
    fn clone_shares_maps_by_reference_and_replaces_arguments() {
        let parent = parent();
        let child = parent.clone_for("search", query_args("q"));

        assert!(child.shared_data.same_instance(&parent.shared_data));
        assert!(child.group_data.same_instance(&parent.group_data));
        assert!(child.parallel_dict.same_instance(&parent.parallel_dict));

        child.shared_data.insert("seen", json!(true));
        assert_eq!(parent.shared_data.get("seen"), Some(json!(true)));
        child.group_data.insert("session", json!("x"));
        assert_eq!(parent.group_data.get("session"), Some(json!("x")));

        assert!(!child.arguments.contains_key("secret"));
        assert_eq!(child.query, "q");
    }

    #[test]
    fn clone_inherits_parallel_id_when_set() {
        let mut parent = parent();
        let detached = parent.clone_for("a", Arguments::new());
        assert!(!detached.parallel_id.is_empty());

        parent.parallel_id = "fan-1".into();
        let sibling = parent.clone_for("b", Arguments::new());
        assert_eq!(sibling.parallel_id, "fan-1");
    }

    #[test]
    fn user_request_starts_at_user_node() {
        let request = Request::new("hello");
        assert_eq!(request.caller, USER);
        assert_eq!(request.call_stack, vec![USER]);
        assert_eq!(request.root_trace_ids, vec![request.trace_id.clone()]);
        assert_eq!(request.depth(), 0);
        assert!(request.router().is_none());
    }
}
