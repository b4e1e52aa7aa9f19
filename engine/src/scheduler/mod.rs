//! Scheduler Agent
//!
//! Five phases turn a scheduling utterance into a committed meeting:
//!
//! 1. **Analyze** - detect intent, extract a window and explicit fields
//! 2. **Check** - find overlapping meetings; a conflict ends the turn with a
//!    replace offer
//! 3. **Gather** - reject past start times, fill missing fields
//! 4. **Confirm** - stage the proposal as the session's pending confirmation
//! 5. **Commit** - on "yes", atomically re-check and insert through the store
//!
//! Follow-up turns (yes/no, replace selection, a missing time) are routed by
//! session state before intent detection runs. Every outcome is a reply;
//! nothing escapes as an error.

pub mod analyze;
pub mod format;
pub mod gather;
pub mod timeparse;
pub mod types;

pub use analyze::IntentAnalyzer;
pub use gather::Gatherer;
pub use types::{SchedulerReply, SchedulerStatus, SchedulingIntent, SchedulingIssue};

use crate::clock::{format_local, offset_from_minutes, Clock};
use crate::config::{SchedulerConfig, UserConfig};
use crate::llm::router::LLMRouter;
use crate::session::{
    ConversationSession, OfferStage, PendingConfirmation, ReplaceTarget, ReplacementOffer, TurnKind,
};
use crate::store::{CommitOutcome, MeetingStore};
use crate::trace::ExecutionTrace;
use analyze::Reply;
use chrono::{Duration, FixedOffset};
use regex::Regex;
use sdk::errors::EngineError;
use sdk::types::Meeting;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Compile a pattern once; a bad pattern disables its rule instead of panicking
pub(crate) fn lazy_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Invalid pattern {:?}: {}", pattern, e);
            None
        }
    })
    .as_ref()
}

/// Which conflict a selection reply points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    One(usize),
    Many,
    NoMatch,
}

pub struct SchedulerAgent {
    analyzer: IntentAnalyzer,
    gatherer: Gatherer,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    default_duration: Duration,
}

impl SchedulerAgent {
    pub fn new(
        llm: Arc<LLMRouter>,
        clock: Arc<dyn Clock>,
        user: &UserConfig,
        config: &SchedulerConfig,
    ) -> Self {
        let offset = offset_from_minutes(config.utc_offset_minutes);
        let default_duration = Duration::minutes(config.default_duration_minutes);
        Self {
            analyzer: IntentAnalyzer::new(Arc::clone(&llm), offset, default_duration),
            gatherer: Gatherer::new(llm, &user.email, &user.name, &config.default_location),
            clock,
            offset,
            default_duration,
        }
    }

    /// Handle one utterance. `None` means "not a scheduling turn": the
    /// caller should hand the utterance to retrieval.
    pub async fn handle(
        &self,
        utterance: &str,
        session: &mut ConversationSession,
        store: &MeetingStore,
    ) -> Option<SchedulerReply> {
        let mut trace = ExecutionTrace::new();
        let reply = analyze::classify_reply(utterance);

        if session.pending().is_some() {
            match reply {
                Some(Reply::Yes) => return Some(self.commit(session, store, trace).await),
                Some(Reply::No) => {
                    if let Some(declined) = session.clear_pending() {
                        trace.record("confirm", "declined", declined.proposal.meeting_id);
                    }
                    return Some(
                        SchedulerReply::new(SchedulerStatus::Rejected, format::DECLINED, trace)
                            .with_issue(SchedulingIssue::Declined),
                    );
                }
                None => {}
            }
        }

        if session.replacement().is_some() {
            if let Some(answer) = self
                .follow_up_offer(utterance, reply, session, store, &mut trace)
                .await
            {
                return Some(answer);
            }
        }

        if let Some(draft) = session.take_draft() {
            if analyze::is_scheduling_intent(utterance) {
                trace.record("analyze", "draft dropped", "new request");
            } else if let Some(intent) = self.complete_draft(draft, utterance) {
                trace.record("analyze", "draft completed", describe(&intent, self.offset));
                return Some(self.plan(intent, None, session, store, trace).await);
            }
        }

        if !analyze::is_scheduling_intent(utterance) {
            let after_schedule = session
                .turns()
                .last()
                .map(|t| t.kind == TurnKind::Schedule)
                .unwrap_or(false);
            if reply == Some(Reply::Yes) && after_schedule {
                trace.record("confirm", "affirmative", "nothing pending");
                return Some(
                    SchedulerReply::new(SchedulerStatus::Clarify, format::NOTHING_PENDING, trace)
                        .with_issue(SchedulingIssue::NothingPending),
                );
            }
            return None;
        }

        let intent = self.analyzer.analyze(utterance, self.clock.now()).await;
        trace.record("analyze", "scheduling intent", describe(&intent, self.offset));
        info!("Scheduling request: {}", describe(&intent, self.offset));
        Some(self.plan(intent, None, session, store, trace).await)
    }

    /// Check, Gather and Confirm for a parsed intent
    async fn plan(
        &self,
        intent: SchedulingIntent,
        replaces: Option<ReplaceTarget>,
        session: &mut ConversationSession,
        store: &MeetingStore,
        mut trace: ExecutionTrace,
    ) -> SchedulerReply {
        let Some(window) = intent.window else {
            if let Some(phrase) = intent.unclear_date.clone() {
                trace.record("gather_details", "unclear date", phrase.clone());
                let message = format::unclear_date(&phrase);
                session.set_draft(intent);
                return SchedulerReply::new(SchedulerStatus::Clarify, message, trace)
                    .with_issue(SchedulingIssue::UnclearDate);
            }
            trace.record("gather_details", "missing time", "asking for a time");
            let message = format::needs_time(intent.date_hint.as_deref());
            if intent.date_hint.is_some() {
                session.set_draft(intent);
            }
            return SchedulerReply::new(SchedulerStatus::Clarify, message, trace)
                .with_issue(SchedulingIssue::NeedsTime);
        };

        // Check
        let excluded = replaces.as_ref().map(|r| r.meeting_id.as_str());
        let conflicts: Vec<Meeting> = store
            .find_conflicts(&window)
            .await
            .into_iter()
            .filter(|m| Some(m.meeting_id.as_str()) != excluded)
            .collect();
        trace.record(
            "check_conflicts",
            format_local(window.start, self.offset),
            format!("{} conflict(s)", conflicts.len()),
        );
        if !conflicts.is_empty() {
            let message = format::conflict(&conflicts, self.gatherer.user_email(), self.offset);
            session.set_replacement(ReplacementOffer {
                intent,
                conflicts: conflicts.clone(),
                stage: OfferStage::Offered,
            });
            return SchedulerReply::new(SchedulerStatus::Clarify, message, trace)
                .with_conflicts(conflicts)
                .with_issue(SchedulingIssue::Conflict);
        }

        // Gather
        let now = self.clock.now();
        if Gatherer::is_past(&window, now) {
            trace.record("gather_details", "validate start", "in the past");
            return SchedulerReply::new(
                SchedulerStatus::Rejected,
                format::past_time(window.start, self.offset),
                trace,
            )
            .with_issue(SchedulingIssue::PastTimeRejected);
        }
        let proposal = self.gatherer.build_proposal(&intent, window).await;
        trace.record("gather_details", "complete", proposal.title.clone());

        // Confirm
        let message = format::proposal(&proposal, replaces.as_ref(), self.offset);
        trace.record("confirm", "awaiting confirmation", proposal.meeting_id.clone());
        session.set_pending(PendingConfirmation {
            proposal: proposal.clone(),
            replaces,
            intent,
        });
        SchedulerReply::new(SchedulerStatus::Pending, message, trace).with_meeting(proposal)
    }

    async fn commit(
        &self,
        session: &mut ConversationSession,
        store: &MeetingStore,
        mut trace: ExecutionTrace,
    ) -> SchedulerReply {
        let Some(pending) = session.pending().cloned() else {
            return SchedulerReply::new(SchedulerStatus::Clarify, format::NOTHING_PENDING, trace)
                .with_issue(SchedulingIssue::NothingPending);
        };
        let replaces = pending.replaces.as_ref().map(|r| r.meeting_id.as_str());

        match store.commit(pending.proposal.clone(), replaces).await {
            Ok(CommitOutcome::Committed { meeting, replaced }) => {
                session.clear_pending();
                trace.record("commit", "insert", format!("stored {}", meeting.meeting_id));
                let message = format::committed(&meeting, replaced.as_ref(), self.offset);
                SchedulerReply::new(SchedulerStatus::Confirmed, message, trace).with_meeting(meeting)
            }
            Ok(CommitOutcome::AlreadyCommitted(meeting)) => {
                session.clear_pending();
                trace.record("commit", "insert", "already stored");
                let message = format::already_committed(&meeting, self.offset);
                SchedulerReply::new(SchedulerStatus::Confirmed, message, trace).with_meeting(meeting)
            }
            Ok(CommitOutcome::Conflict(conflicts)) => {
                trace.record(
                    "commit",
                    "re-check",
                    format!("{} conflict(s) appeared", conflicts.len()),
                );
                let message = format::conflict(&conflicts, self.gatherer.user_email(), self.offset);
                session.set_replacement(ReplacementOffer {
                    intent: pending.intent,
                    conflicts: conflicts.clone(),
                    stage: OfferStage::Offered,
                });
                SchedulerReply::new(SchedulerStatus::Clarify, message, trace)
                    .with_conflicts(conflicts)
                    .with_issue(SchedulingIssue::Conflict)
            }
            Err(EngineError::Persistence(e)) => {
                warn!("Commit failed to persist: {}", e);
                trace.record("commit", "persist", "failed");
                SchedulerReply::new(SchedulerStatus::Pending, format::SAVE_FAILED, trace)
                    .with_meeting(pending.proposal)
                    .with_issue(SchedulingIssue::PersistenceFailure)
            }
            Err(e) => {
                warn!("Commit rejected: {}", e);
                session.clear_pending();
                trace.record("commit", "insert", format!("rejected: {}", e));
                SchedulerReply::new(SchedulerStatus::Rejected, format::COMMIT_FAILED, trace)
            }
        }
    }

    /// Replies to an outstanding replace offer. `None` lets the utterance
    /// through to intent detection.
    async fn follow_up_offer(
        &self,
        utterance: &str,
        reply: Option<Reply>,
        session: &mut ConversationSession,
        store: &MeetingStore,
        trace: &mut ExecutionTrace,
    ) -> Option<SchedulerReply> {
        let offer = session.replacement()?.clone();

        if analyze::wants_other_time(utterance) || reply == Some(Reply::No) {
            session.clear_replacement();
            trace.record("check_conflicts", "replace offer", "declined");
            return Some(SchedulerReply::new(
                SchedulerStatus::Clarify,
                format::OTHER_TIME,
                std::mem::take(trace),
            ));
        }

        let selection = match offer.stage {
            OfferStage::Offered => {
                if !(analyze::wants_replace(utterance) || reply == Some(Reply::Yes)) {
                    return None;
                }
                if offer.conflicts.len() == 1 {
                    Selection::One(0)
                } else {
                    select(&offer.conflicts, utterance)
                }
            }
            OfferStage::AwaitingSelection => match select(&offer.conflicts, utterance) {
                Selection::NoMatch
                    if analyze::is_scheduling_intent(utterance) || looks_like_question(utterance) =>
                {
                    return None;
                }
                other => other,
            },
        };

        match selection {
            Selection::One(index) => {
                session.clear_replacement();
                let target = &offer.conflicts[index];
                trace.record("check_conflicts", "replace", target.meeting_id.clone());
                let replaces = ReplaceTarget {
                    meeting_id: target.meeting_id.clone(),
                    title: target.title.clone(),
                };
                Some(
                    self.plan(offer.intent, Some(replaces), session, store, std::mem::take(trace))
                        .await,
                )
            }
            Selection::Many | Selection::NoMatch => {
                let unmatched = offer.stage == OfferStage::AwaitingSelection;
                if let Some(current) = session.replacement_mut() {
                    current.stage = OfferStage::AwaitingSelection;
                }
                trace.record(
                    "check_conflicts",
                    "replace selection",
                    format!("{} candidate(s)", offer.conflicts.len()),
                );
                Some(
                    SchedulerReply::new(
                        SchedulerStatus::Clarify,
                        format::selection(&offer.conflicts, self.offset, unmatched),
                        std::mem::take(trace),
                    )
                    .with_conflicts(offer.conflicts)
                    .with_issue(SchedulingIssue::AmbiguousReference),
                )
            }
        }
    }

    /// Merge a follow-up like "at 3pm" or "on tuesday" into an incomplete
    /// request. The follow-up's day and time win over the draft's.
    fn complete_draft(&self, draft: SchedulingIntent, utterance: &str) -> Option<SchedulingIntent> {
        let today = timeparse::local_today(self.clock.now(), self.offset);
        let follow = timeparse::parse(utterance, today);
        if !follow.has_time() && follow.date.is_none() {
            return None;
        }
        let earlier = timeparse::parse(&draft.utterance, today);
        let (start, end) = if follow.has_time() {
            (follow.start, follow.end)
        } else {
            (earlier.start, earlier.end)
        };
        let date = follow.date.or(earlier.date);
        let merged = timeparse::ParsedTime {
            date,
            date_phrase: None,
            unresolved_date: if date.is_some() { None } else { earlier.unresolved_date },
            start,
            end,
            duration: follow.duration.or(earlier.duration),
        };
        let Some(window) = merged.window(today, self.offset, self.default_duration) else {
            // a time for a still-unclear day: keep both and ask for the day again
            return merged.unresolved_date.is_some().then(|| SchedulingIntent {
                utterance: format!("{} {}", draft.utterance, utterance),
                ..draft
            });
        };
        Some(SchedulingIntent {
            window: Some(window),
            date_hint: None,
            unclear_date: None,
            ..draft
        })
    }
}

fn describe(intent: &SchedulingIntent, offset: FixedOffset) -> String {
    let when = intent
        .window
        .map(|w| format!("{} for {} min", format_local(w.start, offset), w.duration().num_minutes()))
        .or_else(|| intent.date_hint.as_ref().map(|d| format!("{} (no time)", d)))
        .or_else(|| intent.unclear_date.as_ref().map(|d| format!("{} (no date)", d)))
        .unwrap_or_else(|| "no time".to_string());
    match &intent.title {
        Some(title) => format!("'{}' {}", title, when),
        None => when,
    }
}

fn looks_like_question(text: &str) -> bool {
    const OPENERS: &[&str] = &[
        "what", "who", "when", "where", "why", "how", "which", "is", "are", "does", "do", "can",
        "could", "tell", "explain",
    ];
    text.trim_end().ends_with('?')
        || text
            .split_whitespace()
            .next()
            .map(|w| OPENERS.contains(&w.to_lowercase().as_str()))
            .unwrap_or(false)
}

/// Match a reply against conflict list position, id or title
fn select(conflicts: &[Meeting], text: &str) -> Selection {
    let lower = text.to_lowercase();
    let cleaned: String = lower
        .split_whitespace()
        .filter(|w| !matches!(*w, "replace" | "the" | "number" | "meeting" | "one" | "please" | "with"))
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .trim_start_matches('#')
        .to_string();
    if cleaned.is_empty() {
        return Selection::NoMatch;
    }

    let ordinal = match cleaned.as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "fifth" => Some(5),
        n => n.parse::<usize>().ok(),
    };
    if let Some(n) = ordinal {
        return if (1..=conflicts.len()).contains(&n) {
            Selection::One(n - 1)
        } else {
            Selection::NoMatch
        };
    }

    if let Some(index) = conflicts
        .iter()
        .position(|m| m.meeting_id.eq_ignore_ascii_case(&cleaned))
    {
        return Selection::One(index);
    }

    let matches: Vec<usize> = conflicts
        .iter()
        .enumerate()
        .filter(|(_, m)| {
            let title = m.title.to_lowercase();
            (cleaned.len() >= 3 && title.contains(&cleaned)) || cleaned.contains(&title)
        })
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [one] => Selection::One(*one),
        [] => Selection::NoMatch,
        _ => Selection::Many,
    }
}
