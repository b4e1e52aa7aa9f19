//! Retrieval backends
//!
//! Two interchangeable lookup capabilities feed the retrieval agent: a
//! corpus search over private documents and a live web search. Both are
//! traits so the HTTP services, the local overlap index and test doubles
//! can stand in for one another. [`corpus::CorpusChain`] tries corpus
//! backends in order, ending with the local [`overlap::TokenOverlapIndex`].

use async_trait::async_trait;
use sdk::types::Fragment;
use std::collections::HashSet;

pub mod calendar;
pub mod corpus;
pub mod overlap;
pub mod web;

pub use calendar::CalendarLookup;
pub use corpus::{CorpusChain, CorpusOutcome, RagServerSearch};
pub use overlap::TokenOverlapIndex;
pub use web::TavilySearch;

/// Failure of a single backend call. Never fatal to a query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("{0} rate limited")]
    RateLimited(String),

    #[error("{0} timed out")]
    Timeout(String),
}

impl BackendError {
    pub fn unavailable(backend: &str, detail: impl std::fmt::Display) -> Self {
        tracing::debug!("{} unavailable: {}", backend, detail);
        Self::Unavailable(backend.to_string())
    }
}

/// Search over the private document corpus
#[async_trait]
pub trait CorpusSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `top_k` fragments scoring at least `threshold`, best first
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Fragment>, BackendError>;
}

/// Live web search
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `top_k` snippets, best first
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Fragment>, BackendError>;
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "for" | "are" | "but" | "not" | "you" | "all" | "any" | "can"
            | "this" | "that" | "these" | "those" | "what" | "where" | "when" | "how"
            | "why" | "who" | "which" | "have" | "has" | "had" | "been" | "being" | "will"
            | "would" | "could" | "should" | "about" | "with" | "from" | "into" | "then"
            | "there" | "here" | "some" | "other" | "more" | "most" | "very" | "just"
            | "also" | "than" | "each" | "does" | "doing" | "their" | "them" | "they"
            | "your" | "yours" | "our" | "was" | "were" | "its" | "tell" | "know"
            | "please" | "me" | "my"
    )
}

/// Lower-cased content words of at least three characters, stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !is_stop_word(w))
        .collect()
}

pub fn term_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_and_stop_words() {
        let tokens = tokenize("What is the Kafka retention policy, in short?");
        assert_eq!(tokens, vec!["kafka", "retention", "policy", "short"]);
    }

    #[test]
    fn test_term_set_dedupes() {
        let set = term_set("graph graph GRAPH theory");
        assert_eq!(set.len(), 2);
    }
}
