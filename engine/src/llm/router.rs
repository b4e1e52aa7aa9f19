//! LLM Router
//!
//! Walks the configured providers in preference order, bounding each call
//! by a timeout. The configured default provider goes first; the rest keep
//! their registration order. A failure or timeout falls through to the next
//! provider.

use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use std::sync::Arc;
use std::time::Duration;

pub struct LLMRouter {
    providers: Vec<Box<dyn LLMProvider>>,
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// True when at least one provider is registered
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Providers in the order they will be tried
    pub fn rank_providers(&self) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();
        let default_provider = self.config.default_provider.as_str();
        // stable sort keeps registration order among the rest
        providers.sort_by_key(|p| p.name() != default_provider);
        providers
    }

    fn timeout_for(&self, provider: &dyn LLMProvider) -> Duration {
        if provider.is_local() {
            Duration::from_secs(self.config.local_timeout_secs)
        } else {
            Duration::from_secs(self.config.timeout_secs)
        }
    }

    /// Call providers with automatic failover.
    ///
    /// Returns the completion and the name of the provider that produced it.
    pub async fn call(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let mut last_error = LLMError::ProviderUnavailable("All LLM providers failed".to_string());

        for provider in self.rank_providers() {
            let timeout = self.timeout_for(provider);
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.generate(messages)).await {
                Ok(Ok(response)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok((response, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = e;
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                    last_error = LLMError::Timeout;
                }
            }
        }

        tracing::warn!("All LLM providers exhausted");
        Err(last_error)
    }

    /// Single-shot completion with a system prompt
    pub async fn complete(&self, system: &str, user: &str) -> super::Result<String> {
        let messages = [Message::system(system), Message::user(user)];
        self.call(&messages).await.map(|(text, _)| text)
    }

    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct MockProvider {
        name: &'static str,
        is_local: bool,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn boxed(name: &'static str, is_local: bool, behaviour: Behaviour) -> Box<dyn LLMProvider> {
            Box::new(Self {
                name,
                is_local,
                behaviour,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        async fn generate(&self, _messages: &[Message]) -> super::super::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Reply(text) => Ok(text.to_string()),
                Behaviour::Fail => Err(LLMError::NetworkError("boom".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn test_config(default_provider: &str) -> Arc<LLMConfig> {
        let mut llm = Config::default_config().llm;
        llm.default_provider = default_provider.to_string();
        llm.timeout_secs = 1;
        llm.local_timeout_secs = 1;
        Arc::new(llm)
    }

    #[test]
    fn test_default_provider_ranked_first() {
        let router = LLMRouter::new(
            vec![
                MockProvider::boxed("openrouter", false, Behaviour::Fail),
                MockProvider::boxed("ollama", true, Behaviour::Fail),
            ],
            test_config("ollama"),
        );

        let names: Vec<_> = router.rank_providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ollama", "openrouter"]);
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let router = LLMRouter::new(
            vec![
                MockProvider::boxed("openrouter", false, Behaviour::Fail),
                MockProvider::boxed("ollama", true, Behaviour::Reply("local answer")),
            ],
            test_config("openrouter"),
        );

        let (text, provider) = router.call(&[Message::user("hi")]).await.unwrap();
        assert_eq!(text, "local answer");
        assert_eq!(provider, "ollama");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let router = LLMRouter::new(
            vec![
                MockProvider::boxed("openrouter", false, Behaviour::Hang),
                MockProvider::boxed("ollama", true, Behaviour::Reply("ok")),
            ],
            test_config("openrouter"),
        );

        let text = router.complete("system", "user").await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_all_fail() {
        let router = LLMRouter::new(
            vec![MockProvider::boxed("openrouter", false, Behaviour::Fail)],
            test_config("openrouter"),
        );
        assert!(router.call(&[Message::user("hi")]).await.is_err());
    }

    #[tokio::test]
    async fn test_no_providers() {
        let router = LLMRouter::new(vec![], test_config("openrouter"));
        assert!(!router.has_providers());
        let err = router.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LLMError::ProviderUnavailable(_)));
    }
}
