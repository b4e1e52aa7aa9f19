//! Meeting and retrieval types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a meeting record or time window is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeetingError {
    #[error("start {start} is not before end {end}")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("meeting {0} has more than one organizer")]
    MultipleOrganizers(String),

    #[error("meeting id is empty")]
    MissingId,
}

/// Half-open interval `[start, end)` in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted intervals
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, MeetingError> {
        if start >= end {
            return Err(MeetingError::EmptyWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window starting at `start` and lasting `duration`
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self, MeetingError> {
        Self::new(start, start + duration)
    }

    /// `[s1,e1)` and `[s2,e2)` overlap iff `s1 < e2 && s2 < e1`.
    /// Back-to-back windows never overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A meeting attendee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_organizer: bool,
}

impl Participant {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            is_organizer: false,
        }
    }

    pub fn organizer(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_organizer: true,
            ..Self::new(email, name)
        }
    }

    /// "Name <email>", or whichever of the two is known
    pub fn display(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else if self.email.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

/// A calendar entry
///
/// Records are never mutated in place once stored; an update is a
/// replace-by-id through the meeting store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_location")]
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

fn default_location() -> String {
    "TBD".to_string()
}

impl Meeting {
    /// The meeting's time span. Callers should have run [`Meeting::validate`].
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn organizer(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_organizer)
    }

    /// True when `email` organizes this meeting (case-insensitive)
    pub fn is_organized_by(&self, email: &str) -> bool {
        self.organizer()
            .map(|p| p.email.eq_ignore_ascii_case(email))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), MeetingError> {
        if self.meeting_id.trim().is_empty() {
            return Err(MeetingError::MissingId);
        }
        TimeWindow::new(self.start_time, self.end_time)?;
        if self.participants.iter().filter(|p| p.is_organizer).count() > 1 {
            return Err(MeetingError::MultipleOrganizers(self.meeting_id.clone()));
        }
        Ok(())
    }
}

/// Where a retrieved fragment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Corpus,
    Web,
    Calendar,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Corpus => "corpus",
            Self::Web => "web",
            Self::Calendar => "calendar",
        };
        f.write_str(s)
    }
}

/// A scored piece of text returned by a retrieval backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source: SourceKind,
}

impl Fragment {
    pub fn corpus(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            url: None,
            source: SourceKind::Corpus,
        }
    }

    pub fn web(text: impl Into<String>, score: f32, url: Option<String>) -> Self {
        Self {
            text: text.into(),
            score,
            url,
            source: SourceKind::Web,
        }
    }
}
