//! Single-turn chat with a templated system prompt.
//!
//! The prompt may reference request arguments as `${key}`. Recent history
//! can be passed in `arguments["short_memory"]` as `[{role, content}, ...]`.

use agentweave_core::{Arguments, ChatMessage, LanguageModel, Request, Response, Role, Unit};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::profile::{profile_builders, unit_identity, Profile};

const DEFAULT_PROMPT: &str = "You are a helpful assistant.";

/// Argument key carrying prior conversation turns.
pub const SHORT_MEMORY_KEY: &str = "short_memory";

/// One model call per request.
pub struct ChatAgent {
    profile: Profile,
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
    short_memory_size: usize,
}

impl ChatAgent {
    pub fn new(name: impl Into<String>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            profile: Profile::new(name),
            model,
            system_prompt: DEFAULT_PROMPT.into(),
            short_memory_size: 10,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Keep at most this many exchanges (two messages each) of history.
    pub fn with_short_memory_size(mut self, size: usize) -> Self {
        self.short_memory_size = size;
        self
    }

    pub(crate) fn build_messages(&self, request: &Request) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(render_template(
            &self.system_prompt,
            &request.arguments,
        ))];

        if let Some(Value::Array(history)) = request.arguments.get(SHORT_MEMORY_KEY) {
            let keep = self.short_memory_size * 2;
            let skip = history.len().saturating_sub(keep);
            messages.extend(history.iter().skip(skip).filter_map(|turn| {
                let content = turn.get("content")?.as_str()?;
                let role = turn.get("role").and_then(Value::as_str).map(Role::parse)?;
                Some(ChatMessage {
                    role,
                    content: content.to_string(),
                })
            }));
        }

        messages.push(ChatMessage::user(&request.query));
        messages
    }
}

profile_builders!(ChatAgent);

/// Replace `${key}` with the matching argument. Unknown keys are left as-is.
pub fn render_template(template: &str, arguments: &Arguments) -> String {
    let mut rendered = template.to_string();
    for (key, value) in arguments {
        let placeholder = format!("${{{key}}}");
        if !rendered.contains(&placeholder) {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &text);
    }
    rendered
}

#[async_trait]
impl Unit for ChatAgent {
    unit_identity!();

    async fn execute(&self, request: Request) -> Response {
        let messages = self.build_messages(&request);
        debug!(unit = %self.profile.name, messages = messages.len(), "Chat request");
        match self.model.try_chat(&messages).await {
            Ok(reply) => Response::completed(reply).with_request(request),
            Err(e) => {
                warn!(unit = %self.profile.name, error = %e, "Chat model call failed");
                Response::failed(e.to_string()).with_request(request)
            }
        }
    }
}
