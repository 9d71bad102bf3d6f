//! Model router: builds named models from configuration.

use agentweave_config::AppConfig;
use agentweave_core::provider::LanguageModel;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::fallback::FallbackModel;
use crate::openai_compat::OpenAiCompatModel;

/// Named models plus a default.
pub struct ModelRouter {
    models: HashMap<String, Arc<dyn LanguageModel>>,
    default_model: String,
}

impl ModelRouter {
    /// Create a new router with a default model name.
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            models: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    /// Register a model.
    pub fn register(&mut self, name: impl Into<String>, model: Arc<dyn LanguageModel>) {
        self.models.insert(name.into(), model);
    }

    /// Get the default model.
    pub fn default(&self) -> Option<Arc<dyn LanguageModel>> {
        self.models.get(&self.default_model).cloned()
    }

    /// Get a specific model by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LanguageModel>> {
        self.models.get(name).cloned()
    }

    /// List all registered model names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

/// Build models from configuration.
///
/// Every `[providers.*]` entry becomes a model, the default provider is
/// always present, and a non-empty `[fallback] chain` wraps the default
/// provider followed by the chain into one fallback model that replaces
/// the default.
pub fn build_from_config(config: &AppConfig) -> ModelRouter {
    let mut router = ModelRouter::new(&config.default_provider);

    let build = |name: &str| -> Arc<OpenAiCompatModel> {
        let provider_config = config.providers.get(name).cloned().unwrap_or_default();
        let api_key = provider_config
            .api_key
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let base_url = provider_config
            .api_url
            .unwrap_or_else(|| default_base_url(name));
        let model = provider_config
            .default_model
            .unwrap_or_else(|| config.default_model.clone());
        let temperature = provider_config
            .temperature
            .unwrap_or(config.default_temperature);
        Arc::new(OpenAiCompatModel::new(name, base_url, api_key, model).with_temperature(temperature))
    };

    for name in config.providers.keys() {
        router.register(name.clone(), build(name));
    }

    if router.get(&config.default_provider).is_none() {
        router.register(config.default_provider.clone(), build(&config.default_provider));
    }

    if !config.fallback.chain.is_empty() {
        let timeout = Duration::from_secs(config.fallback.timeout_secs);
        let mut chain = FallbackModel::new(format!("{}+fallback", config.default_provider));
        if let Some(primary) = router.get(&config.default_provider) {
            chain = chain.add(primary, timeout);
        }
        for name in &config.fallback.chain {
            if name == &config.default_provider {
                continue;
            }
            match router.get(name) {
                Some(model) => chain = chain.add(model, timeout),
                None => chain = chain.add(build(name), timeout),
            }
        }
        router.register(config.default_provider.clone(), Arc::new(chain));
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
