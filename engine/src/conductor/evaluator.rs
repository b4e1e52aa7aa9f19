//! Retrieval Evaluator
//!
//! The Reflect phase. Material is sufficient when at least one backend
//! returned something whose best score clears `min_relevance`. Otherwise
//! the evaluator produces a relaxed plan: lower corpus threshold, larger
//! result limit, and both backends.

use crate::conductor::types::{CallOutcome, FetchKind, FetchParams, FetchPlan, PlanSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub sufficient: bool,
    pub reason: String,
}

pub struct Evaluator {
    min_relevance: f32,
    relaxed: FetchParams,
}

impl Evaluator {
    pub fn new(min_relevance: f32, relaxed: FetchParams) -> Self {
        Self {
            min_relevance,
            relaxed,
        }
    }

    pub fn assess(&self, plan: &FetchPlan, outcomes: &[CallOutcome]) -> Assessment {
        if plan.kind == FetchKind::None {
            return Assessment {
                sufficient: true,
                reason: "no material needed".to_string(),
            };
        }

        let best = outcomes
            .iter()
            .filter_map(|o| o.best_score().map(|score| (score, o.call.source())))
            .reduce(|a, b| if b.0 > a.0 { b } else { a });

        match best {
            Some((score, source)) if score >= self.min_relevance => Assessment {
                sufficient: true,
                reason: format!("{} result scored {:.2}", source, score),
            },
            Some((score, _)) => Assessment {
                sufficient: false,
                reason: format!(
                    "best score {:.2} below {:.2}",
                    score, self.min_relevance
                ),
            },
            None => Assessment {
                sufficient: false,
                reason: "no results".to_string(),
            },
        }
    }

    /// The second-pass plan. Always consults both backends.
    pub fn relax(&self, plan: &FetchPlan) -> FetchPlan {
        let added = match plan.kind {
            FetchKind::RagOnly => "adding web",
            FetchKind::WebOnly => "adding corpus",
            FetchKind::Both | FetchKind::None => "widening both",
        };
        FetchPlan::new(
            FetchKind::Both,
            self.relaxed,
            format!(
                "relaxed: threshold {:.2}, top_k {}, {}",
                self.relaxed.threshold, self.relaxed.top_k, added
            ),
            PlanSource::Relaxed,
        )
    }
}
