//! Retrieval Executor
//!
//! Runs every call in a [`FetchPlan`] concurrently. A call that fails or
//! times out yields an empty outcome carrying the error; the phase itself
//! never fails.

use crate::conductor::types::{BackendCall, CallOutcome, FetchPlan};
use crate::retrieval::{BackendError, CorpusChain, WebSearch};
use crate::trace::ExecutionTrace;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct Executor {
    corpus: Arc<CorpusChain>,
    web: Option<Arc<dyn WebSearch>>,
    timeout: Duration,
}

impl Executor {
    pub fn new(corpus: Arc<CorpusChain>, web: Option<Arc<dyn WebSearch>>, timeout: Duration) -> Self {
        Self {
            corpus,
            web,
            timeout,
        }
    }

    /// Execute all planned calls and record each outcome under `phase`
    pub async fn execute(
        &self,
        query: &str,
        plan: &FetchPlan,
        phase: &str,
        trace: &mut ExecutionTrace,
    ) -> Vec<CallOutcome> {
        let start = Instant::now();
        let outcomes = join_all(plan.calls.iter().map(|call| self.run(query, *call))).await;

        for outcome in &outcomes {
            let action = match outcome.call {
                BackendCall::Corpus { top_k, threshold } => {
                    format!("corpus(top_k={}, threshold={:.2})", top_k, threshold)
                }
                BackendCall::Web { top_k } => format!("web(top_k={})", top_k),
            };
            let result = match (&outcome.error, &outcome.backend) {
                (Some(e), _) => format!("failed: {}", e),
                (None, Some(backend)) => format!(
                    "{} fragment(s) from {}, best score {:.2}",
                    outcome.fragments.len(),
                    backend,
                    outcome.best_score().unwrap_or(0.0)
                ),
                (None, None) => format!("{} fragment(s)", outcome.fragments.len()),
            };
            trace.record(phase, action, result);
        }

        debug!(
            "Executed {} call(s) in {}ms",
            outcomes.len(),
            start.elapsed().as_millis()
        );
        outcomes
    }

    async fn run(&self, query: &str, call: BackendCall) -> CallOutcome {
        match call {
            BackendCall::Corpus { top_k, threshold } => {
                let outcome = self.corpus.search_traced(query, top_k, threshold).await;
                // a fallback that answered still counts as success
                let error = match &outcome.backend {
                    Some(_) => None,
                    None => Some(
                        outcome
                            .failures
                            .last()
                            .cloned()
                            .unwrap_or_else(|| BackendError::Unavailable("corpus".to_string())),
                    ),
                };
                let backend = outcome.backend.map(|name| {
                    if outcome.failures.is_empty() {
                        name
                    } else {
                        format!("{} (fallback)", name)
                    }
                });
                CallOutcome {
                    call,
                    fragments: outcome.fragments,
                    backend,
                    error,
                }
            }
            BackendCall::Web { top_k } => {
                let Some(web) = &self.web else {
                    return CallOutcome {
                        call,
                        fragments: Vec::new(),
                        backend: None,
                        error: Some(BackendError::Unavailable("web".to_string())),
                    };
                };
                let result = tokio::time::timeout(self.timeout, web.search(query, top_k)).await;
                let (fragments, error) = match result {
                    Ok(Ok(fragments)) => (fragments, None),
                    Ok(Err(e)) => {
                        tracing::warn!("Web search failed: {}", e);
                        (Vec::new(), Some(e))
                    }
                    Err(_) => {
                        tracing::warn!("Web search timed out after {}s", self.timeout.as_secs());
                        (Vec::new(), Some(BackendError::Timeout(web.name().to_string())))
                    }
                };
                CallOutcome {
                    call,
                    backend: error.is_none().then(|| web.name().to_string()),
                    fragments,
                    error,
                }
            }
        }
    }
}
