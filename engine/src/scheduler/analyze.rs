//! Analyze phase
//!
//! Intent detection is purely lexical: a scheduling verb leading the
//! request, plus a meeting noun or a time expression. Field extraction runs
//! heuristics first and only asks the LLM for fields they missed.

use super::lazy_regex;
use super::timeparse::{self, local_today};
use super::types::SchedulingIntent;
use crate::llm::parse_json_reply;
use crate::llm::router::LLMRouter;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use regex::Regex;
use sdk::types::{Participant, TimeWindow};
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

static LEADING_VERB: OnceLock<Option<Regex>> = OnceLock::new();
static MEETING_NOUN: OnceLock<Option<Regex>> = OnceLock::new();
static QUOTED: OnceLock<Option<Regex>> = OnceLock::new();
static NAMED: OnceLock<Option<Regex>> = OnceLock::new();
static VERB_OBJECT: OnceLock<Option<Regex>> = OnceLock::new();
static TOPIC: OnceLock<Option<Regex>> = OnceLock::new();
static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static WITH_NAMES: OnceLock<Option<Regex>> = OnceLock::new();
static ROOM: OnceLock<Option<Regex>> = OnceLock::new();
static PLACE: OnceLock<Option<Regex>> = OnceLock::new();
static VIRTUAL: OnceLock<Option<Regex>> = OnceLock::new();
static DURATION_WORDS: OnceLock<Option<Regex>> = OnceLock::new();

const VERBS: &str = r"schedule|book|set up|setup|arrange|add|create|put|plan|organi[sz]e|reschedule|pencil in|pencil|meet";

/// Words that end a title or topic phrase
const STOP: &str = r"with|at|on|for|tomorrow|today|tonight|next|this|from|about|to|in|between|regarding|@";

const GENERIC_TITLES: &[&str] = &["meeting", "a meeting", "time", "something", "slot", "event", "it"];

/// True when the utterance asks to put something on the calendar
pub fn is_scheduling_intent(text: &str) -> bool {
    let leading = format!(
        r"(?i)^\s*(?:(?:hi|hey|hello|ok|okay|so|also|and|now|great|thanks)[,!.]?\s+)*(?:(?:please|kindly|pls|can you|could you|would you|will you|i want to|i need to|i would like to|i'd like to|id like to|i wanna|let's|lets|let us|help me|go ahead and)\s+)*(?:{})\b",
        VERBS
    );
    let leads = lazy_regex(&LEADING_VERB, &leading)
        .map(|re| re.is_match(text))
        .unwrap_or(false);
    if !leads {
        return false;
    }

    let noun = r"(?i)\b(meeting|call|sync|chat|session|appointment|review|standup|stand-up|1:1|one-on-one|catch ?up|interview|lunch|coffee|event|demo|office hours)\b";
    let has_noun = lazy_regex(&MEETING_NOUN, noun)
        .map(|re| re.is_match(text))
        .unwrap_or(false);
    if has_noun {
        return true;
    }

    // only presence matters here, not the resolved date
    let parsed = timeparse::parse(text, Utc::now().date_naive());
    parsed.has_time() || parsed.date.is_some() || parsed.unresolved_date.is_some()
}

/// A yes/no answer to a pending question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
}

const YES: &[&str] = &[
    "yes", "y", "yep", "yeah", "yup", "sure", "ok", "okay", "confirm", "confirmed", "do it",
    "go ahead", "schedule it", "add it", "book it", "sounds good", "please do", "absolutely",
    "correct", "that works", "perfect",
];
const NO: &[&str] = &[
    "no", "n", "nope", "nah", "cancel", "cancel it", "never mind", "nevermind", "don't",
    "do not", "stop", "forget it", "not now", "no thanks",
];
/// Openers that make a short utterance a reply even with words after them
const YES_OPENERS: &[&str] = &["yes", "yeah", "yep", "yup", "confirm", "confirmed"];
/// Openers that only agree when an affirmative follows ("ok, book it")
const SOFT_OPENERS: &[&str] = &["ok", "okay", "sure", "alright", "great"];
const NO_OPENERS: &[&str] = &["no", "nope", "cancel"];
const AFFIRMATIVE: &[&str] = &[
    "yes", "yeah", "yep", "confirm", "book", "schedule", "add", "do", "go", "please",
];
/// Words that turn an opener into a change request
const HEDGES: &[&str] = &["but", "not", "instead", "change", "make", "actually", "move"];

pub fn classify_reply(text: &str) -> Option<Reply> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' || c == ' ' { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let phrase = words.join(" ");

    if YES.contains(&phrase.as_str()) {
        return Some(Reply::Yes);
    }
    if NO.contains(&phrase.as_str()) {
        return Some(Reply::No);
    }
    if words.len() > 5 || text.contains('?') {
        return None;
    }
    let (first, rest) = words.split_first()?;
    if rest.iter().any(|w| HEDGES.contains(w)) {
        return None;
    }
    if NO_OPENERS.contains(first) {
        return Some(Reply::No);
    }
    let affirmed = rest.iter().any(|w| AFFIRMATIVE.contains(w));
    if YES_OPENERS.contains(first) || (SOFT_OPENERS.contains(first) && affirmed) {
        return Some(Reply::Yes);
    }
    None
}

pub fn wants_other_time(text: &str) -> bool {
    let lower = text.to_lowercase();
    [
        "another time",
        "different time",
        "other time",
        "pick another",
        "another slot",
        "different slot",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

pub fn wants_replace(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| matches!(w, "replace" | "override" | "swap"))
}

/// Heuristic extraction with no LLM involved
pub fn extract(
    utterance: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
    default_duration: Duration,
) -> SchedulingIntent {
    let today = local_today(now, offset);
    let parsed = timeparse::parse(utterance, today);
    let window = parsed.window(today, offset, default_duration);

    SchedulingIntent {
        utterance: utterance.to_string(),
        window,
        title: extract_title(utterance),
        description: extract_topic(utterance),
        location: extract_location(utterance),
        participants: extract_participants(utterance),
        date_hint: if window.is_none() {
            parsed.date_phrase
        } else {
            None
        },
        unclear_date: parsed.unresolved_date,
    }
}

fn extract_title(text: &str) -> Option<String> {
    if let Some(c) = lazy_regex(&QUOTED, r#"["“]([^"”]{2,80})["”]"#).and_then(|re| re.captures(text)) {
        return c.get(1).map(|m| m.as_str().trim().to_string());
    }

    let named = format!(r"(?i)\b(?:called|titled|named)\s+(.+?)(?:\s+(?:{})\b|[,.?!]|$)", STOP);
    if let Some(c) = lazy_regex(&NAMED, &named).and_then(|re| re.captures(text)) {
        return c.get(1).map(|m| capitalize(m.as_str().trim()));
    }

    let object = format!(
        r"(?i)\b(?:{})\s+(?:(?:me|us)\s+)?(?:(?:a|an|the|my|our)\s+)?(.+?)(?:\s+(?:{})\b|[,.?!]|$)",
        VERBS, STOP
    );
    let phrase = lazy_regex(&VERB_OBJECT, &object)
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;

    let phrase = lazy_regex(&DURATION_WORDS, r"(?i)\b\d+\s*-?\s*(?:minutes?|mins?|hours?|hrs?)\b")
        .map(|re| re.replace_all(&phrase, "").to_string())
        .unwrap_or(phrase);
    let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

    let starts_with_stop = phrase
        .split_whitespace()
        .next()
        .map(|w| STOP.split('|').any(|s| s.eq_ignore_ascii_case(w)))
        .unwrap_or(true);
    let generic = starts_with_stop || GENERIC_TITLES.contains(&phrase.to_lowercase().as_str());
    let has_digits = phrase.chars().any(|c| c.is_ascii_digit());
    if phrase.is_empty() || generic || has_digits || phrase.len() > 60 {
        return None;
    }
    Some(capitalize(&phrase))
}

fn extract_topic(text: &str) -> Option<String> {
    let pattern = r"(?i)\b(?:to discuss|to talk about|about|regarding|re:)\s+(.+?)(?:\s+(?:with|at|on|tomorrow|today|tonight|next|this|from|for)\b|[.?!]|$)";
    lazy_regex(&TOPIC, pattern)
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| capitalize(m.as_str().trim()))
        .filter(|s| !s.is_empty())
}

fn extract_location(text: &str) -> Option<String> {
    if let Some(m) = lazy_regex(&ROOM, r"(?i)\b(?:in|at)\s+(room\s+[\w-]+)")
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        return Some(capitalize(m.as_str()));
    }
    let place = r"\b(?:in|at)\s+((?:[A-Z][\w-]*\s+)?(?:Hall|Room|Building|Library|Center|Lab|Office)(?:\s+[A-Z0-9][\w-]*)?)";
    if let Some(m) = lazy_regex(&PLACE, place)
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        return Some(m.as_str().to_string());
    }
    let venue = lazy_regex(&VIRTUAL, r"(?i)\b(zoom|google meet|teams|online|virtual)\b")
        .and_then(|re| re.find(text))?;
    Some(match venue.as_str().to_lowercase().as_str() {
        "zoom" => "Zoom".to_string(),
        "google meet" => "Google Meet".to_string(),
        "teams" => "Teams".to_string(),
        _ => "Online".to_string(),
    })
}

fn extract_participants(text: &str) -> Vec<Participant> {
    let mut participants: Vec<Participant> = Vec::new();

    if let Some(re) = lazy_regex(&EMAIL, r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+") {
        for m in re.find_iter(text) {
            let email = m.as_str().trim_end_matches('.').to_lowercase();
            let name = email.split('@').next().unwrap_or_default().to_string();
            participants.push(Participant::new(email, capitalize(&name)));
        }
    }

    let names = r"\bwith\s+([A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+)?(?:\s*(?:,|and|&)\s*[A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+)?)*)";
    if let Some(c) = lazy_regex(&WITH_NAMES, names).and_then(|re| re.captures(text)) {
        let list = c.get(1).map(|m| m.as_str()).unwrap_or_default();
        for name in list
            .split(|c: char| c == ',' || c == '&')
            .flat_map(|part| part.split(" and "))
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            let known = participants
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(name));
            if !known {
                participants.push(Participant::new("", name));
            }
        }
    }

    participants
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fields the LLM may supply; anything it cannot tell is null
#[derive(Debug, Default, Deserialize)]
struct LlmFields {
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    participants: Vec<LlmParticipant>,
}

#[derive(Debug, Deserialize)]
struct LlmParticipant {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

pub struct IntentAnalyzer {
    llm: Arc<LLMRouter>,
    offset: FixedOffset,
    default_duration: Duration,
}

impl IntentAnalyzer {
    pub fn new(llm: Arc<LLMRouter>, offset: FixedOffset, default_duration: Duration) -> Self {
        Self {
            llm,
            offset,
            default_duration,
        }
    }

    /// Heuristic fields first; the LLM is asked when the title is missing
    /// or no day could be pinned down (including an unresolved "next week").
    pub async fn analyze(&self, utterance: &str, now: DateTime<Utc>) -> SchedulingIntent {
        let mut intent = extract(utterance, now, self.offset, self.default_duration);
        let incomplete = intent.title.is_none() || (intent.window.is_none() && intent.date_hint.is_none());
        if incomplete && self.llm.has_providers() {
            self.fill_from_llm(&mut intent, now).await;
        }
        intent
    }

    async fn fill_from_llm(&self, intent: &mut SchedulingIntent, now: DateTime<Utc>) {
        let system = "You extract meeting details from a scheduling request.\n\
            Output ONLY a JSON object with the keys start_time, end_time (RFC 3339, UTC), \
            title, description, location and participants (list of {name, email}).\n\
            Use null for anything the request does not state. Never invent a time.";
        let prompt = format!(
            "Current time: {} (user's UTC offset: {})\nRequest: {}",
            now.to_rfc3339(),
            self.offset,
            intent.utterance
        );

        let reply = match self.llm.complete(system, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("LLM extraction failed, keeping heuristic fields: {}", e);
                return;
            }
        };
        let Some(fields) = parse_json_reply::<LlmFields>(&reply) else {
            tracing::warn!("Unparseable extraction reply, keeping heuristic fields");
            return;
        };

        if intent.window.is_none() {
            if let Some(start) = fields.start_time {
                let end = fields
                    .end_time
                    .filter(|end| *end > start)
                    .unwrap_or(start + self.default_duration);
                intent.window = TimeWindow::new(start, end).ok();
                if intent.window.is_some() {
                    intent.date_hint = None;
                    intent.unclear_date = None;
                }
            }
        }
        if intent.title.is_none() {
            intent.title = fields.title.filter(|t| !t.trim().is_empty());
        }
        if intent.description.is_none() {
            intent.description = fields.description.filter(|d| !d.trim().is_empty());
        }
        if intent.location.is_none() {
            intent.location = fields.location.filter(|l| !l.trim().is_empty());
        }
        if intent.participants.is_empty() {
            intent.participants = fields
                .participants
                .into_iter()
                .filter(|p| !(p.name.is_empty() && p.email.is_empty()))
                .map(|p| Participant::new(p.email, p.name))
                .collect();
        }
    }
}
