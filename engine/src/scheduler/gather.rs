//! Gather phase
//!
//! Turns an intent with a resolved window into a fully specified meeting.
//! Missing fields come from the LLM when one is configured, otherwise from
//! fixed defaults. The requesting user is always the organizer.

use super::types::SchedulingIntent;
use crate::llm::parse_json_reply;
use crate::llm::router::LLMRouter;
use chrono::{DateTime, Utc};
use sdk::types::{Meeting, Participant, TimeWindow};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub struct Gatherer {
    llm: Arc<LLMRouter>,
    user: Participant,
    default_location: String,
}

impl Gatherer {
    pub fn new(llm: Arc<LLMRouter>, user_email: &str, user_name: &str, default_location: &str) -> Self {
        Self {
            llm,
            user: Participant::organizer(user_email, user_name),
            default_location: default_location.to_string(),
        }
    }

    pub fn user_email(&self) -> &str {
        &self.user.email
    }

    /// True when the window starts before `now`
    pub fn is_past(window: &TimeWindow, now: DateTime<Utc>) -> bool {
        window.start < now
    }

    pub async fn build_proposal(&self, intent: &SchedulingIntent, window: TimeWindow) -> Meeting {
        let participants = self.participants(intent);

        let mut title = intent.title.clone();
        let mut description = intent.description.clone();
        if title.is_none() || description.is_none() {
            if let Some(suggestion) = self.suggest(intent).await {
                title = title.or(suggestion.title.filter(|t| !t.trim().is_empty()));
                description = description.or(suggestion.description.filter(|d| !d.trim().is_empty()));
            }
        }

        Meeting {
            meeting_id: new_meeting_id(),
            title: title.unwrap_or_else(|| default_title(&participants)),
            description: description.unwrap_or_default(),
            location: intent
                .location
                .clone()
                .unwrap_or_else(|| self.default_location.clone()),
            start_time: window.start,
            end_time: window.end,
            participants,
        }
    }

    /// Organizer first, then everyone named in the request
    fn participants(&self, intent: &SchedulingIntent) -> Vec<Participant> {
        let mut participants = vec![self.user.clone()];
        for p in &intent.participants {
            let is_user = !p.email.is_empty() && p.email.eq_ignore_ascii_case(&self.user.email);
            let duplicate = participants.iter().any(|q| {
                (!p.email.is_empty() && q.email.eq_ignore_ascii_case(&p.email))
                    || (!p.name.is_empty() && q.name.eq_ignore_ascii_case(&p.name))
            });
            if !is_user && !duplicate {
                participants.push(Participant {
                    is_organizer: false,
                    ..p.clone()
                });
            }
        }
        participants
    }

    async fn suggest(&self, intent: &SchedulingIntent) -> Option<Suggestion> {
        if !self.llm.has_providers() {
            return None;
        }
        let system = "You name calendar entries. Given a scheduling request, output ONLY a JSON \
            object {\"title\": \"...\", \"description\": \"...\"}. The title is at most six \
            words; the description is one short sentence or null.";
        match self.llm.complete(system, &intent.utterance).await {
            Ok(reply) => parse_json_reply(&reply),
            Err(e) => {
                tracing::warn!("Title suggestion failed, using defaults: {}", e);
                None
            }
        }
    }
}

fn default_title(participants: &[Participant]) -> String {
    let others: Vec<&str> = participants
        .iter()
        .filter(|p| !p.is_organizer)
        .map(|p| if p.name.is_empty() { p.email.as_str() } else { p.name.as_str() })
        .collect();
    if others.is_empty() {
        "Meeting".to_string()
    } else {
        format!("Meeting with {}", others.join(", "))
    }
}

/// `meeting_` plus eight hex digits
pub fn new_meeting_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("meeting_{}", &id[..8])
}
