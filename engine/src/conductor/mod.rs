//! Retrieval Planning Agent
//!
//! Plan, execute and reflect over the retrieval backends, with at most
//! [`MAX_REPLANS`] relaxed second pass, then summarize each source and
//! synthesize an answer from whatever material was found. Backend failures only ever show up in the
//! trace and the `degraded` flag.

pub mod evaluator;
pub mod executor;
pub mod planner;
pub mod types;

pub use evaluator::{Assessment, Evaluator};
pub use executor::Executor;
pub use planner::Planner;
pub use types::{
    BackendCall, CallOutcome, Decision, FetchKind, FetchParams, FetchPlan, PlanSource,
    RetrievalAnswer, MAX_REPLANS,
};

use crate::retrieval::CalendarLookup;
use crate::session::ConversationSession;
use crate::synthesizer::{AnswerSynthesizer, SourceSummary, SynthesisContext};
use futures::future::join_all;
use crate::trace::ExecutionTrace;
use sdk::types::{Fragment, SourceKind};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

pub struct RetrievalAgent {
    planner: Planner,
    executor: Executor,
    evaluator: Evaluator,
    synthesizer: AnswerSynthesizer,
    calendar: Option<CalendarLookup>,
    history_turns: usize,
}

impl RetrievalAgent {
    pub fn new(
        planner: Planner,
        executor: Executor,
        evaluator: Evaluator,
        synthesizer: AnswerSynthesizer,
        history_turns: usize,
    ) -> Self {
        Self {
            planner,
            executor,
            evaluator,
            synthesizer,
            calendar: None,
            history_turns,
        }
    }

    /// Answer calendar questions from the meeting store as well
    pub fn with_calendar(mut self, calendar: CalendarLookup) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub async fn handle(&self, query: &str, session: &ConversationSession) -> RetrievalAnswer {
        let start = Instant::now();
        let mut trace = ExecutionTrace::new();
        let turns = session.recent_turns(self.history_turns);

        // Plan
        let mut plan = self.planner.plan(query, turns, session.meeting()).await;
        let reasoning = plan.rationale.clone();
        trace.record(
            "plan",
            format!("{:?} via {:?}", plan.kind, plan.planned_by),
            plan.rationale.clone(),
        );
        info!(kind = ?plan.kind, "Planned retrieval");

        // Execute, then Reflect with at most MAX_REPLANS relaxed passes
        let mut outcomes = self.executor.execute(query, &plan, "execute", &mut trace).await;
        let mut replans = 0;
        loop {
            if plan.kind == FetchKind::None {
                break;
            }
            let assessment = self.evaluator.assess(&plan, &outcomes);
            let verdict = if assessment.sufficient {
                "sufficient"
            } else {
                "insufficient"
            };
            trace.record("reflect", verdict, assessment.reason.clone());
            if assessment.sufficient || replans >= MAX_REPLANS {
                break;
            }

            replans += 1;
            plan = self.evaluator.relax(&plan);
            trace.record("plan", "relax", plan.rationale.clone());
            debug!("Re-planning: {}", plan.rationale);
            let retry = self.executor.execute(query, &plan, "execute", &mut trace).await;
            outcomes.extend(retry);
        }

        let degraded = outcomes.iter().any(|o| {
            o.error.is_some()
                || o
                    .backend
                    .as_deref()
                    .map(|b| b.ends_with("(fallback)"))
                    .unwrap_or(false)
        });

        let mut sources = merge(&outcomes);
        let decision = Decision::from_material(
            sources.contains_key(&SourceKind::Corpus.to_string()),
            sources.contains_key(&SourceKind::Web.to_string()),
        );

        if let Some(calendar) = &self.calendar {
            let upcoming = calendar.lookup(query).await;
            if !upcoming.is_empty() {
                trace.record(
                    "execute",
                    "calendar",
                    format!("{} upcoming meeting(s)", upcoming.len()),
                );
                sources.insert(SourceKind::Calendar.to_string(), upcoming);
            }
        }

        let summaries: Vec<SourceSummary> = join_all(
            [SourceKind::Corpus, SourceKind::Web]
                .into_iter()
                .filter_map(|kind| {
                    sources
                        .get(&kind.to_string())
                        .map(|fragments| self.synthesizer.summarize(query, kind, fragments))
                }),
        )
        .await;
        if !summaries.is_empty() {
            let llm_written = summaries.iter().filter(|s| !s.templated).count();
            trace.record(
                "summarize",
                format!("{} source(s)", summaries.len()),
                format!("{} by llm", llm_written),
            );
        }

        let material: Vec<Fragment> = sources.values().flatten().cloned().collect();
        let grounded = !material.is_empty();
        let synthesis = self
            .synthesizer
            .synthesize(
                query,
                &material,
                SynthesisContext {
                    turns,
                    meeting: session.meeting(),
                    summaries: &summaries,
                },
            )
            .await;
        trace.record(
            "synthesize",
            if synthesis.templated { "template" } else { "llm" },
            format!("{} fragment(s), decision {}", material.len(), decision),
        );

        info!(
            decision = %decision,
            replans,
            degraded,
            "Answered in {}ms",
            start.elapsed().as_millis()
        );

        RetrievalAnswer {
            answer: synthesis.text,
            decision,
            reasoning,
            sources,
            summaries,
            trace,
            grounded,
            degraded,
        }
    }
}

/// Fragments per source, best first, with repeated texts dropped
fn merge(outcomes: &[CallOutcome]) -> BTreeMap<String, Vec<Fragment>> {
    let mut sources: BTreeMap<String, Vec<Fragment>> = BTreeMap::new();
    let mut seen = HashSet::new();

    for outcome in outcomes {
        for fragment in &outcome.fragments {
            if fragment.text.trim().is_empty() {
                continue;
            }
            if !seen.insert((fragment.source, fragment.text.clone())) {
                continue;
            }
            sources
                .entry(fragment.source.to_string())
                .or_default()
                .push(fragment.clone());
        }
    }

    for fragments in sources.values_mut() {
        fragments.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
    sources
}
