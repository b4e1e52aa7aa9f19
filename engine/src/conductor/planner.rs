//! Retrieval Planner
//!
//! Classifies a query into a [`FetchKind`]. The LLM is asked first; when it
//! is unavailable or answers with something unparseable the planner falls
//! back to keyword cues plus an entity check: a proper noun the corpus has
//! never seen biases the plan toward the web.

use crate::conductor::types::{FetchKind, FetchParams, FetchPlan, PlanSource};
use crate::llm::parse_json_reply;
use crate::llm::router::LLMRouter;
use crate::retrieval::{tokenize, TokenOverlapIndex};
use crate::session::Turn;
use sdk::types::Meeting;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Turns shown to the planning model
const PLANNING_HISTORY: usize = 4;

const WEB_CUES: &[&str] = &[
    "latest",
    "news",
    "today",
    "current",
    "recent",
    "recently",
    "this week",
    "price",
    "stock",
    "weather",
    "website",
    "online",
    "search the web",
    "look up",
    "who is",
    "company",
    "funding",
    "released",
];

const CORPUS_CUES: &[&str] = &[
    "notes",
    "lecture",
    "slides",
    "document",
    "docs",
    "course",
    "syllabus",
    "assignment",
    "homework",
    "materials",
    "chapter",
    "textbook",
    "according to",
    "our ",
    "we discussed",
    "internal",
];

const SMALLTALK: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "thanks",
    "thank you",
    "thx",
    "bye",
    "goodbye",
    "good morning",
    "good night",
    "ok thanks",
];

/// What the planning model is asked to return
#[derive(Debug, Deserialize)]
struct RawDecision {
    decision: String,
    #[serde(default)]
    reason: Option<String>,
}

pub struct Planner {
    llm: Arc<LLMRouter>,
    vocabulary: Option<Arc<TokenOverlapIndex>>,
    params: FetchParams,
}

impl Planner {
    pub fn new(
        llm: Arc<LLMRouter>,
        vocabulary: Option<Arc<TokenOverlapIndex>>,
        params: FetchParams,
    ) -> Self {
        Self {
            llm,
            vocabulary,
            params,
        }
    }

    pub async fn plan(&self, query: &str, turns: &[Turn], meeting: Option<&Meeting>) -> FetchPlan {
        if self.llm.has_providers() {
            match self.llm_plan(query, turns, meeting).await {
                Some(plan) => return plan,
                None => tracing::warn!("LLM planning failed, using heuristic plan"),
            }
        }
        self.heuristic_plan(query, meeting)
    }

    async fn llm_plan(&self, query: &str, turns: &[Turn], meeting: Option<&Meeting>) -> Option<FetchPlan> {
        let system = "You decide where to look for the answer to a user's question.\n\
            Sources:\n\
            - \"corpus\": the user's private documents, course materials and notes\n\
            - \"web\": live web search for public or recent facts, companies, people\n\
            - \"both\": the question needs private context and public facts\n\
            - \"none\": greetings, thanks, or questions answerable from the conversation alone\n\n\
            Output ONLY a JSON object: {\"decision\": \"corpus|web|both|none\", \"reason\": \"...\"}";

        let mut prompt = String::new();
        if let Some(meeting) = meeting {
            prompt.push_str(&format!(
                "Current meeting: {}\nDescription: {}\n\n",
                meeting.title, meeting.description
            ));
        }
        let start = turns.len().saturating_sub(PLANNING_HISTORY);
        if start < turns.len() {
            prompt.push_str("Recent conversation:\n");
            for turn in &turns[start..] {
                prompt.push_str(&format!("User: {}\nAssistant: {}\n", turn.query, turn.answer));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("Question: {}", query));

        let reply = match self.llm.complete(system, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Planner LLM call failed: {}", e);
                return None;
            }
        };

        let raw: RawDecision = parse_json_reply(&reply)?;
        let kind = parse_kind(&raw.decision)?;
        Some(FetchPlan::new(
            kind,
            self.params,
            raw.reason.unwrap_or_else(|| format!("model chose {}", raw.decision)),
            PlanSource::Llm,
        ))
    }

    /// Keyword and entity heuristics. Defaults to both backends.
    pub fn heuristic_plan(&self, query: &str, meeting: Option<&Meeting>) -> FetchPlan {
        let lower = query.to_lowercase();
        let normalized = lower
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();

        if SMALLTALK.contains(&normalized.as_str()) {
            return FetchPlan::new(FetchKind::None, self.params, "small talk", PlanSource::Heuristic);
        }

        let mut web_reasons = Vec::new();
        let mut corpus_reasons = Vec::new();

        if let Some(cue) = WEB_CUES.iter().find(|c| lower.contains(*c)) {
            web_reasons.push(format!("web cue '{}'", cue));
        }
        if let Some(cue) = CORPUS_CUES.iter().find(|c| lower.contains(*c)) {
            corpus_reasons.push(format!("corpus cue '{}'", cue.trim()));
        }

        for entity in entities(query, meeting) {
            let known = self
                .vocabulary
                .as_ref()
                .map(|v| v.mentions(&entity))
                .unwrap_or(false);
            if known {
                corpus_reasons.push(format!("'{}' appears in corpus", entity));
            } else {
                web_reasons.push(format!("'{}' not in corpus", entity));
            }
        }

        let kind = match (corpus_reasons.is_empty(), web_reasons.is_empty()) {
            (false, true) => FetchKind::RagOnly,
            (true, false) => FetchKind::WebOnly,
            _ => FetchKind::Both,
        };
        let rationale = if corpus_reasons.is_empty() && web_reasons.is_empty() {
            "no cues, consulting both".to_string()
        } else {
            corpus_reasons
                .into_iter()
                .chain(web_reasons)
                .collect::<Vec<_>>()
                .join("; ")
        };

        FetchPlan::new(kind, self.params, rationale, PlanSource::Heuristic)
    }
}

fn parse_kind(decision: &str) -> Option<FetchKind> {
    match decision.trim().to_lowercase().as_str() {
        "corpus" | "rag" | "drive" | "rag_only" => Some(FetchKind::RagOnly),
        "web" | "web_only" => Some(FetchKind::WebOnly),
        "both" | "hybrid" => Some(FetchKind::Both),
        "none" | "history" | "meetings" => Some(FetchKind::None),
        _ => None,
    }
}

/// Proper-noun candidates: capitalized query words that do not open the
/// sentence, plus query words that are capitalized in the meeting record.
fn entities(query: &str, meeting: Option<&Meeting>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    let words: Vec<&str> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    for (i, word) in words.iter().enumerate() {
        let word = word.trim_end_matches("'s").trim_matches('\'');
        let capitalized = word.chars().next().map(char::is_uppercase).unwrap_or(false);
        if i > 0 && capitalized && word.len() > 1 && word != "I" && !tokenize(word).is_empty() {
            found.insert(word.to_string());
        }
    }

    if let Some(meeting) = meeting {
        let record = format!(
            "{} {} {}",
            meeting.title,
            meeting.description,
            meeting
                .participants
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let query_terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        for word in record.split(|c: char| !c.is_alphanumeric()) {
            let capitalized = word.chars().next().map(char::is_uppercase).unwrap_or(false);
            if capitalized && query_terms.contains(&word.to_lowercase()) {
                found.insert(word.to_string());
            }
        }
    }

    found
}
