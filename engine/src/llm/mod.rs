//! LLM Provider Abstraction Layer
//!
//! A common interface over the chat-completion providers (OpenRouter and a
//! local Ollama). The agents treat the model as an opaque capability: given
//! a prompt it returns text, or fails. [`router::LLMRouter`] walks an ordered
//! provider list so a failing provider falls through to the next one.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openrouter;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a chat request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openrouter")
    fn name(&self) -> &str;

    /// Returns true for providers running on this machine
    fn is_local(&self) -> bool;

    /// Generate a completion for the given chat messages
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently reachable
    async fn check_health(&self) -> bool {
        true
    }
}

/// Parse a JSON object out of model output.
///
/// Handles raw JSON, fenced blocks (with or without trailing prose) and an
/// object embedded in prose.
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Option<T> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let json_str = extract_balanced_json(&trimmed[start..])?;
    serde_json::from_str(json_str).ok()
}

/// Extract the body of the first markdown code fence in the text.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plan {
        decision: String,
    }

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[test]
    fn test_parse_raw_json() {
        let plan: Plan = parse_json_reply(r#"{"decision": "web"}"#).unwrap();
        assert_eq!(plan.decision, "web");
    }

    #[test]
    fn test_parse_fenced_json_with_trailing_prose() {
        let content = "Here you go:\n```json\n{\"decision\": \"drive\"}\n```\nHope that helps!";
        let plan: Plan = parse_json_reply(content).unwrap();
        assert_eq!(plan.decision, "drive");
    }

    #[test]
    fn test_parse_embedded_json() {
        let content = r#"I think {"decision": "hybrid", "note": "has } brace"} is best"#;
        let plan: Plan = parse_json_reply(content).unwrap();
        assert_eq!(plan.decision, "hybrid");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_json_reply::<Plan>("no json here").is_none());
        assert!(parse_json_reply::<Plan>("{ unterminated").is_none());
    }
}
