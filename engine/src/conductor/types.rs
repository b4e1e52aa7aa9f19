//! Retrieval planning types

use crate::retrieval::BackendError;
use crate::synthesizer::SourceSummary;
use crate::trace::ExecutionTrace;
use sdk::types::{Fragment, SourceKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Reflect may send the query back through Execute at most this many times
pub const MAX_REPLANS: usize = 1;

/// Which backends a query should consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    RagOnly,
    WebOnly,
    Both,
    None,
}

impl FetchKind {
    pub fn uses_corpus(self) -> bool {
        matches!(self, Self::RagOnly | Self::Both)
    }

    pub fn uses_web(self) -> bool {
        matches!(self, Self::WebOnly | Self::Both)
    }
}

/// One parameterized backend invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendCall {
    Corpus { top_k: usize, threshold: f32 },
    Web { top_k: usize },
}

impl BackendCall {
    pub fn source(&self) -> SourceKind {
        match self {
            Self::Corpus { .. } => SourceKind::Corpus,
            Self::Web { .. } => SourceKind::Web,
        }
    }
}

/// Result-count limit and corpus threshold for one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchParams {
    pub top_k: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Llm,
    Heuristic,
    Relaxed,
}

/// Output of the Plan phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchPlan {
    pub kind: FetchKind,
    pub calls: Vec<BackendCall>,
    pub rationale: String,
    pub planned_by: PlanSource,
}

impl FetchPlan {
    pub fn new(
        kind: FetchKind,
        params: FetchParams,
        rationale: impl Into<String>,
        planned_by: PlanSource,
    ) -> Self {
        let mut calls = Vec::new();
        if kind.uses_corpus() {
            calls.push(BackendCall::Corpus {
                top_k: params.top_k,
                threshold: params.threshold,
            });
        }
        if kind.uses_web() {
            calls.push(BackendCall::Web {
                top_k: params.top_k,
            });
        }
        Self {
            kind,
            calls,
            rationale: rationale.into(),
            planned_by,
        }
    }
}

/// What one backend call produced
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub call: BackendCall,
    pub fragments: Vec<Fragment>,
    /// Concrete backend that answered (e.g. `overlap` after a corpus fallback)
    pub backend: Option<String>,
    pub error: Option<BackendError>,
}

impl CallOutcome {
    pub fn best_score(&self) -> Option<f32> {
        self.fragments.iter().map(|f| f.score).reduce(f32::max)
    }
}

/// Which material the answer was grounded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Rag,
    Web,
    Hybrid,
    None,
}

impl Decision {
    pub fn from_material(has_corpus: bool, has_web: bool) -> Self {
        match (has_corpus, has_web) {
            (true, true) => Self::Hybrid,
            (true, false) => Self::Rag,
            (false, true) => Self::Web,
            (false, false) => Self::None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rag => "rag",
            Self::Web => "web",
            Self::Hybrid => "hybrid",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Result of `RetrievalAgent::handle`
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalAnswer {
    pub answer: String,
    pub decision: Decision,
    /// Why the first plan fetched what it did
    pub reasoning: String,
    /// Fragments used for the answer keyed by source (`corpus`, `web`, `calendar`)
    pub sources: BTreeMap<String, Vec<Fragment>>,
    /// Corpus and web material condensed for the question
    pub summaries: Vec<SourceSummary>,
    pub trace: ExecutionTrace,
    /// False when synthesis ran without any fetched material
    pub grounded: bool,
    /// True when a backend failed or fell back during this query
    pub degraded: bool,
}
