//! Integration tests for LLM provider failover

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use genie_engine::config::{Config, LLMConfig};
use genie_engine::llm::router::LLMRouter;
use genie_engine::llm::{LLMError, LLMProvider, Message};

struct ScriptedProvider {
    name: &'static str,
    local: bool,
    reply: Result<&'static str, &'static str>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn ok(name: &'static str, reply: &'static str) -> Self {
        Self {
            name,
            local: false,
            reply: Ok(reply),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            reply: Err("upstream 502"),
            ..Self::ok(name, "")
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn generate(&self, _messages: &[Message]) -> Result<String, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.reply {
            Ok(text) => Ok(text.to_string()),
            Err(e) => Err(LLMError::ProviderUnavailable(e.to_string())),
        }
    }
}

fn config(default_provider: &str) -> Arc<LLMConfig> {
    let mut llm = Config::default_config().llm;
    llm.default_provider = default_provider.to_string();
    llm.timeout_secs = 1;
    llm.local_timeout_secs = 1;
    Arc::new(llm)
}

fn prompt() -> Vec<Message> {
    vec![Message::user("When is the thesis check-in?")]
}

#[tokio::test]
async fn test_default_provider_tried_first() {
    let router = LLMRouter::new(
        vec![
            Box::new(ScriptedProvider::ok("ollama", "from ollama")),
            Box::new(ScriptedProvider::ok("openrouter", "from openrouter")),
        ],
        config("openrouter"),
    );

    let names: Vec<&str> = router.rank_providers().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["openrouter", "ollama"]);

    let (text, provider) = router.call(&prompt()).await.unwrap();
    assert_eq!(text, "from openrouter");
    assert_eq!(provider, "openrouter");
}

#[tokio::test]
async fn test_failover_to_next_provider() {
    let failing = ScriptedProvider::failing("openrouter");
    let failing_calls = Arc::clone(&failing.calls);
    let router = LLMRouter::new(
        vec![
            Box::new(failing),
            Box::new(ScriptedProvider::ok("ollama", "local answer")),
        ],
        config("openrouter"),
    );

    let (text, provider) = router.call(&prompt()).await.unwrap();
    assert_eq!(text, "local answer");
    assert_eq!(provider, "ollama");
    assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_fails_over() {
    let slow = ScriptedProvider {
        delay: Duration::from_secs(5),
        local: true,
        ..ScriptedProvider::ok("ollama", "too late")
    };
    let router = LLMRouter::new(
        vec![
            Box::new(slow),
            Box::new(ScriptedProvider::ok("openrouter", "in time")),
        ],
        config("ollama"),
    );

    let (text, provider) = router.call(&prompt()).await.unwrap();
    assert_eq!(text, "in time");
    assert_eq!(provider, "openrouter");
}

#[tokio::test]
async fn test_all_providers_fail_returns_last_error() {
    let router = LLMRouter::new(
        vec![
            Box::new(ScriptedProvider::failing("openrouter")),
            Box::new(ScriptedProvider::failing("ollama")),
        ],
        config("openrouter"),
    );

    let err = router.call(&prompt()).await.unwrap_err();
    assert!(matches!(err, LLMError::ProviderUnavailable(ref m) if m.contains("upstream 502")));
}

#[tokio::test]
async fn test_no_providers() {
    let router = LLMRouter::new(vec![], config("openrouter"));
    assert!(!router.has_providers());

    let err = router.call(&prompt()).await.unwrap_err();
    assert!(err.to_string().contains("No LLM providers configured"));
}
