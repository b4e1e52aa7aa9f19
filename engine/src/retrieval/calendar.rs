//! Calendar lookup
//!
//! Questions about the user's own schedule ("what are my next 3
//! meetings?") are answered from the meeting store rather than the corpus
//! or the web. The lookup yields extra fragments for the synthesizer; it
//! does not change which backends the planner chooses.

use crate::clock::{format_local, format_local_time, Clock};
use crate::scheduler::lazy_regex;
use crate::store::MeetingStore;
use chrono::FixedOffset;
use regex::Regex;
use sdk::types::{Fragment, Meeting, SourceKind};
use std::sync::{Arc, OnceLock};

const DEFAULT_COUNT: usize = 3;
const MAX_COUNT: usize = 20;

const CALENDAR_CUES: &[&str] = &[
    "meeting",
    "upcoming",
    "calendar",
    "my schedule",
    "events",
    "attend",
    "class",
    "office hours",
    "appointment",
];

static NEXT_N: OnceLock<Option<Regex>> = OnceLock::new();

fn next_n() -> Option<&'static Regex> {
    lazy_regex(&NEXT_N, r"(?i)\bnext\s+(\d{1,3})\b")
}

pub struct CalendarLookup {
    store: Arc<MeetingStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl CalendarLookup {
    pub fn new(store: Arc<MeetingStore>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            offset,
        }
    }

    pub fn is_calendar_query(query: &str) -> bool {
        let lower = query.to_lowercase();
        CALENDAR_CUES.iter().any(|cue| lower.contains(cue))
            || next_n().map(|re| re.is_match(query)).unwrap_or(false)
    }

    /// "next N" in the query, else 3
    pub fn requested_count(query: &str) -> usize {
        next_n()
            .and_then(|re| re.captures(query))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_COUNT))
            .unwrap_or(DEFAULT_COUNT)
    }

    /// Upcoming meetings as fragments, soonest first. Empty for queries
    /// that are not about the calendar.
    pub async fn lookup(&self, query: &str) -> Vec<Fragment> {
        if !Self::is_calendar_query(query) {
            return Vec::new();
        }
        let now = self.clock.now();
        self.store
            .list()
            .await
            .into_iter()
            .filter(|m| m.end_time > now)
            .take(Self::requested_count(query))
            .map(|m| Fragment {
                text: self.describe(&m),
                score: 1.0,
                url: None,
                source: SourceKind::Calendar,
            })
            .collect()
    }

    fn describe(&self, meeting: &Meeting) -> String {
        let mut text = format!(
            "{} ({} - {}), location: {}",
            meeting.title,
            format_local(meeting.start_time, self.offset),
            format_local_time(meeting.end_time, self.offset),
            meeting.location
        );
        if !meeting.description.trim().is_empty() {
            text.push_str(&format!(", about: {}", meeting.description.trim()));
        }
        if !meeting.participants.is_empty() {
            let names: Vec<String> = meeting
                .participants
                .iter()
                .map(|p| if p.name.is_empty() { p.email.clone() } else { p.name.clone() })
                .collect();
            text.push_str(&format!(", with: {}", names.join(", ")));
        }
        text
    }
}
