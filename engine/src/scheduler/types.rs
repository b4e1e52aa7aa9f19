//! Scheduler types

use crate::trace::ExecutionTrace;
use sdk::types::{Meeting, Participant, TimeWindow};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerStatus {
    Confirmed,
    Pending,
    Rejected,
    Clarify,
}

/// Why a reply is not a plain confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingIssue {
    Conflict,
    PastTimeRejected,
    AmbiguousReference,
    PersistenceFailure,
    Declined,
    NeedsTime,
    UnclearDate,
    NothingPending,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerReply {
    pub status: SchedulerStatus,
    pub message: String,
    /// The proposal (pending) or the stored record (confirmed)
    pub meeting: Option<Meeting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Meeting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<SchedulingIssue>,
    pub trace: ExecutionTrace,
}

impl SchedulerReply {
    pub fn new(status: SchedulerStatus, message: impl Into<String>, trace: ExecutionTrace) -> Self {
        Self {
            status,
            message: message.into(),
            meeting: None,
            conflicts: Vec::new(),
            issue: None,
            trace,
        }
    }

    pub fn with_meeting(mut self, meeting: Meeting) -> Self {
        self.meeting = Some(meeting);
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<Meeting>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_issue(mut self, issue: SchedulingIssue) -> Self {
        self.issue = Some(issue);
        self
    }
}

/// What the Analyze phase pulled out of an utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulingIntent {
    pub utterance: String,
    pub window: Option<TimeWindow>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub participants: Vec<Participant>,
    /// The date phrase when a day was given without a time ("on friday")
    pub date_hint: Option<String>,
    /// A day reference that could not be pinned to a date ("next week")
    pub unclear_date: Option<String>,
}
