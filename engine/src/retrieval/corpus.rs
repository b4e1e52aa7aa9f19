//! Corpus search backends and the ordered fallback chain

use super::{BackendError, CorpusSearch};
use async_trait::async_trait;
use sdk::types::Fragment;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Remote corpus search server: `POST {base_url}/api/search`
pub struct RagServerSearch {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(alias = "content")]
    text: String,
    #[serde(default)]
    score: f32,
}

impl RagServerSearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CorpusSearch for RagServerSearch {
    fn name(&self) -> &str {
        "rag_server"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Fragment>, BackendError> {
        let url = format!("{}/api/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "top_k": top_k, "threshold": threshold }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.name().to_string())
                } else {
                    BackendError::unavailable(self.name(), e)
                }
            })?;

        if !response.status().is_success() {
            return Err(BackendError::unavailable(self.name(), response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| BackendError::unavailable(self.name(), e))?;

        let mut fragments: Vec<Fragment> = body
            .results
            .into_iter()
            .filter(|hit| !hit.text.trim().is_empty() && hit.score >= threshold)
            .map(|hit| Fragment::corpus(hit.text, hit.score))
            .collect();
        fragments.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fragments.truncate(top_k);
        Ok(fragments)
    }
}

/// What the chain did for one query
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusOutcome {
    pub fragments: Vec<Fragment>,
    /// The backend that answered, if any did
    pub backend: Option<String>,
    /// Backends that failed before one answered
    pub failures: Vec<BackendError>,
}

impl CorpusOutcome {
    /// True when the answer came from a fallback rather than the first link
    pub fn degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Corpus backends tried in order; the first one that answers wins, even
/// with zero results. Each attempt is bounded by `timeout`.
pub struct CorpusChain {
    links: Vec<Arc<dyn CorpusSearch>>,
    timeout: Duration,
}

impl CorpusChain {
    pub fn new(links: Vec<Arc<dyn CorpusSearch>>, timeout: Duration) -> Self {
        Self { links, timeout }
    }

    pub fn names(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.name()).collect()
    }

    pub async fn search_traced(&self, query: &str, top_k: usize, threshold: f32) -> CorpusOutcome {
        let mut failures = Vec::new();

        for link in &self.links {
            let attempt = tokio::time::timeout(self.timeout, link.search(query, top_k, threshold)).await;
            let error = match attempt {
                Ok(Ok(fragments)) => {
                    return CorpusOutcome {
                        fragments,
                        backend: Some(link.name().to_string()),
                        failures,
                    }
                }
                Ok(Err(e)) => e,
                Err(_) => BackendError::Timeout(link.name().to_string()),
            };
            tracing::warn!("Corpus backend failed, falling back: {}", error);
            failures.push(error);
        }

        CorpusOutcome {
            fragments: Vec::new(),
            backend: None,
            failures,
        }
    }
}

#[async_trait]
impl CorpusSearch for CorpusChain {
    fn name(&self) -> &str {
        "corpus"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<Fragment>, BackendError> {
        let outcome = self.search_traced(query, top_k, threshold).await;
        match outcome.backend {
            Some(_) => Ok(outcome.fragments),
            None => Err(outcome
                .failures
                .into_iter()
                .last()
                .unwrap_or_else(|| BackendError::Unavailable("corpus".to_string()))),
        }
    }
}
