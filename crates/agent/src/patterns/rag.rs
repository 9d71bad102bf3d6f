//! RAG pattern: retrieve, then chat.
//!
//! # Flow
//!
//! 1. Ask the [`KnowledgeRetriever`] for text relevant to the request
//! 2. Store it under `arguments[knowledge_placeholder]`
//! 3. Run the chat behaviour, whose prompt embeds `${knowledge}`
//!
//! Retrieval failures degrade to an empty knowledge section.

use agentweave_core::{Error, LanguageModel, Request, Response, Unit};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::chat::ChatAgent;
use super::profile::Profile;

const DEFAULT_RAG_PROMPT: &str = "You are a helpful assistant. You can refer to the following information to answer the questions.\n${knowledge}";

/// Source of grounding text for a request.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(&self, request: &Request) -> Result<String, Error>;
}

#[async_trait]
impl<F, Fut> KnowledgeRetriever for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, Error>> + Send + 'static,
{
    async fn retrieve(&self, request: &Request) -> Result<String, Error> {
        self(request.clone()).await
    }
}

/// Chat grounded in retrieved knowledge.
pub struct RagAgent {
    chat: ChatAgent,
    retriever: Arc<dyn KnowledgeRetriever>,
    knowledge_placeholder: String,
}

impl RagAgent {
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn LanguageModel>,
        retriever: Arc<dyn KnowledgeRetriever>,
    ) -> Self {
        Self {
            chat: ChatAgent::new(name, model).with_system_prompt(DEFAULT_RAG_PROMPT),
            retriever,
            knowledge_placeholder: "knowledge".into(),
        }
    }

    /// The prompt should reference `${<knowledge_placeholder>}`.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.chat = self.chat.with_system_prompt(prompt);
        self
    }

    pub fn with_knowledge_placeholder(mut self, key: impl Into<String>) -> Self {
        self.knowledge_placeholder = key.into();
        self
    }

    pub fn with_short_memory_size(mut self, size: usize) -> Self {
        self.chat = self.chat.with_short_memory_size(size);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.chat = self.chat.with_description(description);
        self
    }

    pub fn with_policy(mut self, policy: agentweave_core::UnitPolicy) -> Self {
        self.chat = self.chat.with_policy(policy);
        self
    }

    pub fn as_master(mut self) -> Self {
        self.chat = self.chat.as_master();
        self
    }

    pub fn profile(&self) -> &Profile {
        self.chat.profile()
    }
}

#[async_trait]
impl Unit for RagAgent {
    fn name(&self) -> &str {
        self.chat.name()
    }

    fn description(&self) -> &str {
        self.chat.description()
    }

    fn is_master(&self) -> bool {
        self.chat.is_master()
    }

    fn policy(&self) -> &agentweave_core::UnitPolicy {
        self.chat.policy()
    }

    async fn execute(&self, mut request: Request) -> Response {
        let knowledge = match self.retriever.retrieve(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(unit = %self.name(), error = %e, "Retrieval failed, continuing without knowledge");
                String::new()
            }
        };
        debug!(unit = %self.name(), chars = knowledge.len(), "Knowledge retrieved");
        let chars = knowledge.len();
        request
            .arguments
            .insert(self.knowledge_placeholder.clone(), Value::String(knowledge));
        self.chat
            .execute(request)
            .await
            .with_extra("knowledge_chars", chars)
    }
}
