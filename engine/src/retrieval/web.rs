//! Web search over the Tavily search API
//!
//! `POST {base_url}/search` with `{api_key, query, max_results}`; the
//! response carries `results[].{content, url, score}`.

use super::{BackendError, WebSearch};
use crate::secrets::{scrub, SecretString};
use async_trait::async_trait;
use sdk::types::Fragment;
use serde::Deserialize;
use serde_json::json;

pub struct TavilySearch {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

impl TavilySearch {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "web"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Fragment>, BackendError> {
        let Some(api_key) = &self.api_key else {
            return Err(BackendError::unavailable(self.name(), "no API key configured"));
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({
                "api_key": api_key.unsecure(),
                "query": query,
                "max_results": top_k,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.name().to_string())
                } else {
                    BackendError::unavailable(self.name(), scrub(&e.to_string()))
                }
            })?;

        match response.status().as_u16() {
            200..=299 => {}
            429 => return Err(BackendError::RateLimited(self.name().to_string())),
            status => return Err(BackendError::unavailable(self.name(), status)),
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| BackendError::unavailable(self.name(), e))?;

        let count = body.results.len().max(1) as f32;
        Ok(body
            .results
            .into_iter()
            .filter(|hit| !hit.content.trim().is_empty())
            .enumerate()
            // rank-derived score when the API omits one
            .map(|(rank, hit)| {
                let score = hit.score.unwrap_or(1.0 - rank as f32 / (count + 1.0));
                Fragment::web(hit.content, score.clamp(0.0, 1.0), hit.url)
            })
            .take(top_k)
            .collect())
    }
}
