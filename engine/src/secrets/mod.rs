pub mod string;

pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// Keychain key for the OpenRouter API key
pub const OPENROUTER_API_KEY: &str = "openrouter_api_key";

/// Keychain key for the web search API key
pub const WEB_SEARCH_API_KEY: &str = "tavily_api_key";

/// SecretManager resolves API keys for the LLM and web search backends.
///
/// Lookup order: environment variable (the key upper-cased, e.g.
/// `OPENROUTER_API_KEY`), then the OS keychain under the manager's service
/// name. A missing key is not an error; the backend that needs it reports
/// itself unavailable and the caller falls back.
///
/// The manager also scrubs secrets out of provider error text before it is
/// logged.
pub struct SecretManager {
    service_name: String,
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// OpenAI/OpenRouter keys (sk-, sk-or-v1-), Tavily keys and bearer tokens
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"tvly-[a-zA-Z0-9\-_]{16,}",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

impl SecretManager {
    /// The service name namespaces secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Environment variable consulted before the keychain
    pub fn env_var_name(key: &str) -> String {
        key.to_ascii_uppercase()
    }

    /// Resolve a secret from the environment or the keychain.
    ///
    /// Returns `Ok(None)` when neither has it.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if the keychain itself fails.
    pub fn get_secret(&self, key: &str) -> Result<Option<SecretString>, EngineError> {
        if let Ok(value) = std::env::var(Self::env_var_name(key)) {
            if !value.trim().is_empty() {
                tracing::debug!("Using secret '{}' from environment", key);
                return Ok(Some(SecretString::new(value.trim())));
            }
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(Some(SecretString::new(secret)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Like [`get_secret`](Self::get_secret) but treats keychain failures
    /// as a missing key. Headless machines often have no secret service.
    pub fn lookup(&self, key: &str) -> Option<SecretString> {
        match self.get_secret(key) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::warn!("{}", self.scrub(&e.to_string()));
                None
            }
        }
    }

    /// Stores a secret in the OS keychain.
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        if value.trim().is_empty() {
            return Err(EngineError::KeyringError(
                "Secret cannot be empty".to_string(),
            ));
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.set_password(value.trim()).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Deletes a secret from the OS keychain.
    pub fn delete_secret(&self, key: &str) -> Result<(), EngineError> {
        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.delete_password().map_err(|e| {
            EngineError::KeyringError(format!("Failed to delete secret '{}': {}", key, e))
        })?;

        tracing::info!("Deleted secret '{}' from keychain", key);
        Ok(())
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use genie_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new("test");
    /// let scrubbed = manager.scrub("My API key is sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "My API key is [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        scrub(text)
    }
}

/// Free-function form of [`SecretManager::scrub`] for code without a manager
pub fn scrub(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }
    result
}
