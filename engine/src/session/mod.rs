//! Conversation sessions
//!
//! One session per meeting thread. It owns the append-only turn history
//! both agents read as context, the single Pending Confirmation slot and
//! the scheduler's replacement offer. Sessions are never shared between
//! threads; see [`registry::SessionRegistry`].

pub mod registry;

pub use registry::SessionRegistry;

use crate::conductor::types::Decision;
use crate::scheduler::types::SchedulingIntent;
use chrono::{DateTime, Utc};
use sdk::types::Meeting;
use serde::Serialize;

/// How a turn was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Rag,
    Web,
    Hybrid,
    None,
    Schedule,
}

impl From<Decision> for TurnKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Rag => Self::Rag,
            Decision::Web => Self::Web,
            Decision::Hybrid => Self::Hybrid,
            Decision::None => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub query: String,
    pub answer: String,
    pub kind: TurnKind,
    pub timestamp: DateTime<Utc>,
}

/// The meeting a confirmed proposal will supersede
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceTarget {
    pub meeting_id: String,
    pub title: String,
}

/// A fully specified proposal awaiting the user's yes or no
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub proposal: Meeting,
    pub replaces: Option<ReplaceTarget>,
    pub intent: SchedulingIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStage {
    /// The conflict was reported with a replace offer
    Offered,
    /// The user said "replace" but several meetings conflict
    AwaitingSelection,
}

/// Outstanding "replace the conflicting meeting?" offer
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementOffer {
    pub intent: SchedulingIntent,
    pub conflicts: Vec<Meeting>,
    pub stage: OfferStage,
}

#[derive(Debug)]
pub struct ConversationSession {
    id: String,
    meeting: Option<Meeting>,
    turns: Vec<Turn>,
    pending: Option<PendingConfirmation>,
    replacement: Option<ReplacementOffer>,
    /// A request that named a day but no time, kept for one follow-up
    draft: Option<SchedulingIntent>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, meeting: Option<Meeting>) -> Self {
        Self {
            id: id.into(),
            meeting,
            turns: Vec::new(),
            pending: None,
            replacement: None,
            draft: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The meeting this thread is about, if any
    pub fn meeting(&self) -> Option<&Meeting> {
        self.meeting.as_ref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn record(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Stage a proposal, replacing any stale one
    pub fn set_pending(&mut self, pending: PendingConfirmation) {
        if let Some(stale) = &self.pending {
            tracing::debug!(
                session = %self.id,
                "Discarding stale proposal '{}'",
                stale.proposal.title
            );
        }
        self.replacement = None;
        self.pending = Some(pending);
    }

    pub fn clear_pending(&mut self) -> Option<PendingConfirmation> {
        self.pending.take()
    }

    pub fn replacement(&self) -> Option<&ReplacementOffer> {
        self.replacement.as_ref()
    }

    pub fn set_replacement(&mut self, offer: ReplacementOffer) {
        self.pending = None;
        self.replacement = Some(offer);
    }

    pub fn replacement_mut(&mut self) -> Option<&mut ReplacementOffer> {
        self.replacement.as_mut()
    }

    pub fn clear_replacement(&mut self) -> Option<ReplacementOffer> {
        self.replacement.take()
    }

    pub fn set_draft(&mut self, intent: SchedulingIntent) {
        self.draft = Some(intent);
    }

    pub fn take_draft(&mut self) -> Option<SchedulingIntent> {
        self.draft.take()
    }
}
