//! Model fallback: ordered retry chain with per-model timeouts.
//!
//! When a model fails (timeout, rate limit, error), the next model in the
//! chain is tried. Only when every entry fails does the chain report an
//! error, which `LanguageModel::chat` then degrades as usual.

use agentweave_core::error::ProviderError;
use agentweave_core::message::ChatMessage;
use agentweave_core::provider::LanguageModel;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A model that wraps an ordered list of models and falls back on failure.
pub struct FallbackModel {
    name: String,
    chain: Vec<FallbackEntry>,
}

/// A single entry in the fallback chain.
struct FallbackEntry {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl FallbackModel {
    /// Create a new fallback model with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a model to the chain with a custom timeout.
    pub fn add(mut self, model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { model, timeout });
        self
    }

    /// Add a model with the default timeout (120s).
    pub fn add_default(self, model: Arc<dyn LanguageModel>) -> Self {
        self.add(model, Duration::from_secs(120))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl LanguageModel for FallbackModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No models in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let model_name = entry.model.name().to_string();

            info!(
                model = %model_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying model"
            );

            match tokio::time::timeout(entry.timeout, entry.model.try_chat(messages)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    warn!(model = %model_name, error = %e, "Fallback: model failed, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        model = %model_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: model timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Model '{}' timed out after {}s",
                        model_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `error`, or replies with `reply`, after `delay`.
    struct Stub {
        name: String,
        outcome: Result<String, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Stub {
        fn ok(name: &str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                outcome: Ok(reply.into()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                outcome: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                outcome: Ok("late".into()),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for Stub {
        fn name(&self) -> &str {
            &self.name
        }

        async fn try_chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone()
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hello")]
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let a = Stub::ok("a", "from a");
        let b = Stub::ok("b", "from b");
        let chain = FallbackModel::new("chain").add_default(a.clone()).add_default(b.clone());

        assert_eq!(chain.try_chat(&messages()).await.unwrap(), "from a");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn falls_through_failures() {
        let a = Stub::failing("a", ProviderError::RateLimited { retry_after_secs: 5 });
        let b = Stub::ok("b", "from b");
        let chain = FallbackModel::new("chain").add_default(a.clone()).add_default(b.clone());

        assert_eq!(chain.try_chat(&messages()).await.unwrap(), "from b");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_moves_to_next_model() {
        let slow = Stub::slow("slow", Duration::from_secs(60));
        let fast = Stub::ok("fast", "fast reply");
        let chain = FallbackModel::new("chain")
            .add(slow, Duration::from_secs(1))
            .add_default(fast);

        assert_eq!(chain.try_chat(&messages()).await.unwrap(), "fast reply");
    }

    #[tokio::test]
    async fn all_failures_return_last_error() {
        let chain = FallbackModel::new("chain")
            .add_default(Stub::failing("a", ProviderError::Network("down".into())))
            .add_default(Stub::failing("b", ProviderError::AuthenticationFailed("bad key".into())));

        let err = chain.try_chat(&messages()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = FallbackModel::new("empty");
        assert!(chain.is_empty());
        let err = chain.try_chat(&messages()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
