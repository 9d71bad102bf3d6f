//! OpenAI-compatible chat-completions transport.
//!
//! Works with OpenAI, DeepSeek, Ollama, vLLM and any endpoint exposing
//! `POST {base}/chat/completions` with bearer auth.

use agentweave_core::error::ProviderError;
use agentweave_core::message::ChatMessage;
use agentweave_core::provider::LanguageModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A model behind an OpenAI-compatible endpoint.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    /// Create a new OpenAI-compatible model client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            client,
        }
    }

    /// OpenAI (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// DeepSeek (convenience constructor).
    pub fn deepseek(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("deepseek", "https://api.deepseek.com/v1", api_key, model)
    }

    /// Ollama (convenience constructor). Ollama ignores the key.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The request body sent to `/chat/completions`.
    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
        })
    }
}

/// Extract `choices[0].message.content` from a completion body.
fn parse_completion(body: ApiResponse) -> Result<String, ProviderError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages);

        debug!(provider = %self.name, model = %self.model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parse_completion(api_response)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let model = OpenAiCompatModel::openai("sk-test", "gpt-4o-mini").with_temperature(0.2);
        let body = model.request_body(&[ChatMessage::system("be brief"), ChatMessage::user("hi")]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parse_completion_takes_first_choice() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "first" } },
                { "message": { "role": "assistant", "content": "second" } }
            ]
        }))
        .unwrap();
        assert_eq!(parse_completion(body).unwrap(), "first");
    }

    #[test]
    fn parse_completion_without_choices_is_invalid() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            parse_completion(body),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn base_url_is_normalized() {
        let model = OpenAiCompatModel::ollama(Some("http://localhost:11434/v1/"), "llama3");
        assert_eq!(model.base_url, "http://localhost:11434/v1");
        assert_eq!(model.name(), "ollama");
    }

    #[tokio::test]
    async fn unreachable_endpoint_degrades_in_chat() {
        let model = OpenAiCompatModel::new("local", "http://127.0.0.1:9", "k", "m");
        let reply = model.chat(&[ChatMessage::user("hi")]).await;
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["type"], "answer");
    }
}
