//! Language-model contract.
//!
//! A model takes an ordered list of messages and produces text. Transports
//! (OpenAI-compatible HTTP, fallback chains, test doubles) implement
//! [`LanguageModel::try_chat`]; orchestration code normally calls
//! [`LanguageModel::chat`], which never fails.

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::message::ChatMessage;

/// Build the degraded payload returned in place of a transport failure.
///
/// The payload is a well-formed `answer` decision so that reactive loops
/// terminate gracefully instead of special-casing provider errors.
pub fn degraded_reply(error: &ProviderError) -> String {
    serde_json::json!({
        "type": "answer",
        "content": format!("Model call failed: {error}"),
    })
    .to_string()
}

/// The core LanguageModel trait.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable model name (for logs).
    fn name(&self) -> &str;

    /// Send the conversation and return the model's reply text.
    async fn try_chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Like [`try_chat`](Self::try_chat), but folds transport failures into
    /// a degraded textual payload.
    async fn chat(&self, messages: &[ChatMessage]) -> String {
        match self.try_chat(messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(model = %self.name(), error = %e, "Model call failed, returning degraded reply");
                degraded_reply(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    #[async_trait]
    impl LanguageModel for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn try_chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn chat_degrades_transport_failure_to_answer_payload() {
        let reply = Offline.chat(&[ChatMessage::user("hi")]).await;
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["type"], "answer");
        assert!(value["content"].as_str().unwrap().contains("connection refused"));
    }
}
