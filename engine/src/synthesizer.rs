//! Answer Synthesizer
//!
//! Composes fetched fragments, the current meeting and recent turns into a
//! prompt for the LLM. When the model fails or returns nothing the answer is
//! a templated list of the best fragments, so the result is never empty.
//!
//! Corpus and web material can first be condensed into a one or two
//! sentence [`SourceSummary`] per source; the answer prompt then carries the
//! summary in place of the raw fragments.

use crate::clock::{format_local, Clock};
use crate::llm::router::LLMRouter;
use crate::session::Turn;
use chrono::FixedOffset;
use sdk::types::{Fragment, Meeting, SourceKind};
use serde::Serialize;
use std::sync::Arc;

/// Fragments listed by the templated fallback
const FALLBACK_FRAGMENTS: usize = 3;
/// Characters kept per fallback fragment
const FALLBACK_CHARS: usize = 200;
/// Fragments a templated source summary keeps
const SUMMARY_FRAGMENTS: usize = 2;

const NO_MATERIAL: &str = "I don't have information about that right now. \
    Try rephrasing, or ask about something in your documents or calendar.";

const DETAIL_CUES: &[&str] = &[
    "explain",
    "details",
    "in detail",
    "elaborate",
    "why",
    "how",
    "walk me through",
];

/// Conversation state the answer may draw on
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisContext<'a> {
    pub turns: &'a [Turn],
    pub meeting: Option<&'a Meeting>,
    /// Per-source digests that stand in for that source's fragments
    pub summaries: &'a [SourceSummary],
}

/// One source's material condensed for the question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub source: SourceKind,
    pub text: String,
    /// True when the LLM was unavailable and the best fragments were kept
    pub templated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Concise,
    Detailed,
}

impl Style {
    pub fn for_query(query: &str) -> Self {
        let lower = query.to_lowercase();
        let detailed = DETAIL_CUES.iter().any(|cue| {
            lower
                .split(|c: char| !c.is_alphanumeric() && c != ' ')
                .any(|part| contains_phrase(part, cue))
        });
        if detailed {
            Self::Detailed
        } else {
            Self::Concise
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Concise => {
                "Answer in 2-3 sentences. Be direct; skip preamble and do not restate the question."
            }
            Self::Detailed => {
                "Give a thorough answer: explain the reasoning step by step and include \
                 relevant specifics from the sources."
            }
        }
    }
}

/// Word-boundary phrase match ("how" must not match "show")
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let words: Vec<&str> = haystack.split_whitespace().collect();
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub text: String,
    /// True when the LLM was unavailable and the template was used
    pub templated: bool,
}

pub struct AnswerSynthesizer {
    llm: Arc<LLMRouter>,
    history_turns: usize,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<LLMRouter>,
        history_turns: usize,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            llm,
            history_turns,
            clock,
            offset,
        }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        fragments: &[Fragment],
        context: SynthesisContext<'_>,
    ) -> Synthesis {
        if self.llm.has_providers() {
            let system = self.system_prompt(Style::for_query(query));
            let prompt = self.user_prompt(query, fragments, context);
            match self.llm.complete(&system, &prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    return Synthesis {
                        text: text.trim().to_string(),
                        templated: false,
                    };
                }
                Ok(_) => tracing::warn!("LLM returned an empty answer, using template"),
                Err(e) => tracing::warn!("Answer synthesis failed: {}", e),
            }
        }
        Synthesis {
            text: fallback_answer(fragments),
            templated: true,
        }
    }

    /// Condense one source's fragments to 1-2 sentences for `query`
    pub async fn summarize(&self, query: &str, source: SourceKind, fragments: &[Fragment]) -> SourceSummary {
        if self.llm.has_providers() && !fragments.is_empty() {
            let label = match source {
                SourceKind::Corpus => "course materials",
                SourceKind::Web => "web research",
                SourceKind::Calendar => "the calendar",
            };
            let content: Vec<&str> = fragments.iter().map(|f| f.text.trim()).collect();
            let prompt = format!(
                "Content from {}:\n{}\n\nSummarize in 1-2 sentences for query: \"{}\"",
                label,
                content.join("\n"),
                query
            );
            match self
                .llm
                .complete("You summarize retrieved material for a meeting assistant.", &prompt)
                .await
            {
                Ok(text) if !text.trim().is_empty() => {
                    return SourceSummary {
                        source,
                        text: text.trim().to_string(),
                        templated: false,
                    };
                }
                Ok(_) => tracing::warn!("LLM returned an empty {} summary", source),
                Err(e) => tracing::warn!("Summarizing {} failed: {}", source, e),
            }
        }

        let mut ranked: Vec<&Fragment> = fragments.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        let kept: Vec<String> = ranked
            .into_iter()
            .take(SUMMARY_FRAGMENTS)
            .map(|f| truncate(f.text.trim(), FALLBACK_CHARS))
            .collect();
        SourceSummary {
            source,
            text: kept.join(" "),
            templated: true,
        }
    }

    fn system_prompt(&self, style: Style) -> String {
        format!(
            "You are a meeting assistant answering questions during and between meetings.\n\
             Current time: {}.\n\
             Use only the provided sources and conversation. If they do not contain the \
             answer, say so plainly instead of guessing.\n\
             Meetings that ended before the current time are in the past: describe them in \
             past tense. Meetings after the current time are upcoming.\n\
             {}",
            format_local(self.clock.now(), self.offset),
            style.instruction()
        )
    }

    fn user_prompt(&self, query: &str, fragments: &[Fragment], context: SynthesisContext<'_>) -> String {
        let mut prompt = String::new();

        if let Some(meeting) = context.meeting {
            prompt.push_str(&format!(
                "Current meeting: {} ({})\n",
                meeting.title,
                format_local(meeting.start_time, self.offset)
            ));
            if !meeting.description.is_empty() {
                prompt.push_str(&format!("About: {}\n", meeting.description));
            }
            prompt.push('\n');
        }

        let start = context.turns.len().saturating_sub(self.history_turns);
        if start < context.turns.len() {
            prompt.push_str("Conversation so far:\n");
            for turn in &context.turns[start..] {
                prompt.push_str(&format!("User: {}\nAssistant: {}\n", turn.query, turn.answer));
            }
            prompt.push('\n');
        }

        if fragments.is_empty() {
            prompt.push_str("[No grounding found: no source returned relevant material]\n\n");
        } else {
            for (kind, heading) in [
                (SourceKind::Corpus, "From course materials"),
                (SourceKind::Web, "From research"),
                (SourceKind::Calendar, "From the calendar"),
            ] {
                let section: Vec<&Fragment> = fragments.iter().filter(|f| f.source == kind).collect();
                if section.is_empty() {
                    continue;
                }
                prompt.push_str(heading);
                prompt.push_str(":\n");
                let summary = context
                    .summaries
                    .iter()
                    .find(|s| s.source == kind && !s.templated);
                if let Some(summary) = summary {
                    prompt.push_str(&summary.text);
                    prompt.push('\n');
                    for url in section.iter().filter_map(|f| f.url.as_deref()) {
                        prompt.push_str(&format!("- {}\n", url));
                    }
                    prompt.push('\n');
                    continue;
                }
                for fragment in section {
                    match &fragment.url {
                        Some(url) => prompt.push_str(&format!("- {} ({})\n", fragment.text, url)),
                        None => prompt.push_str(&format!("- {}\n", fragment.text)),
                    }
                }
                prompt.push('\n');
            }
        }

        prompt.push_str(&format!("Question: {}", query));
        prompt
    }
}

/// Top fragments by score, each cut to a readable length
pub fn fallback_answer(fragments: &[Fragment]) -> String {
    if fragments.is_empty() {
        return NO_MATERIAL.to_string();
    }

    let mut ranked: Vec<&Fragment> = fragments.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut answer = String::from("Here's what I found:");
    for fragment in ranked.into_iter().take(FALLBACK_FRAGMENTS) {
        answer.push_str("\n- ");
        answer.push_str(&truncate(fragment.text.trim(), FALLBACK_CHARS));
    }
    answer
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{offset_from_minutes, FixedClock};
    use crate::config::Config;
    use crate::llm::{LLMError, LLMProvider, Message};
    use crate::session::TurnKind;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct Recording {
        reply: Option<&'static str>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LLMProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_local(&self) -> bool {
            true
        }

        async fn generate(&self, messages: &[Message]) -> crate::llm::Result<String> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.extend(messages.iter().map(|m| m.content.clone()));
            }
            self.reply.map(str::to_string).ok_or(LLMError::Timeout)
        }
    }

    fn synthesizer(providers: Vec<Box<dyn LLMProvider>>) -> AnswerSynthesizer {
        let llm = Arc::new(LLMRouter::new(providers, Arc::new(Config::default_config().llm)));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap()));
        AnswerSynthesizer::new(llm, 2, clock, offset_from_minutes(0))
    }

    #[test]
    fn test_style_detection() {
        assert_eq!(Style::for_query("Explain Dijkstra"), Style::Detailed);
        assert_eq!(Style::for_query("walk me through the proof"), Style::Detailed);
        assert_eq!(Style::for_query("show my notes"), Style::Concise);
        assert_eq!(Style::for_query("when is the exam"), Style::Concise);
    }

    #[test]
    fn test_fallback_lists_top_three() {
        let fragments = vec![
            Fragment::corpus("low", 0.1),
            Fragment::corpus("x".repeat(500), 0.9),
            Fragment::web("mid", 0.5, None),
            Fragment::web("high", 0.8, None),
        ];
        let answer = fallback_answer(&fragments);
        let lines: Vec<&str> = answer.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].len() < 220);
        assert_eq!(lines[2], "- high");
        assert!(!answer.contains("low"));
    }

    #[test]
    fn test_fallback_without_material_is_not_empty() {
        assert!(!fallback_answer(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_uses_template() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording {
            reply: None,
            seen,
        })]);
        let result = s
            .synthesize("what is a heap", &[Fragment::corpus("A heap is a tree.", 0.7)], SynthesisContext::default())
            .await;
        assert!(result.templated);
        assert!(result.text.contains("A heap is a tree."));
    }

    #[tokio::test]
    async fn test_prompt_carries_sources_and_history() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording {
            reply: Some("Heaps are trees."),
            seen: Arc::clone(&seen),
        })]);
        let turns: Vec<Turn> = (0..4)
            .map(|n| Turn {
                query: format!("question {}", n),
                answer: format!("answer {}", n),
                kind: TurnKind::Rag,
                timestamp: Utc.with_ymd_and_hms(2025, 11, 20, 8, n, 0).unwrap(),
            })
            .collect();
        let fragments = vec![
            Fragment::corpus("A heap is a tree.", 0.7),
            Fragment::web("Heaps in practice", 0.6, Some("https://example.org".to_string())),
        ];

        let result = s
            .synthesize(
                "what is a heap",
                &fragments,
                SynthesisContext {
                    turns: &turns,
                    meeting: None,
                    summaries: &[],
                },
            )
            .await;

        assert_eq!(result.text, "Heaps are trees.");
        let prompt = seen.lock().unwrap().join("\n");
        assert!(prompt.contains("From course materials"));
        assert!(prompt.contains("From research"));
        assert!(prompt.contains("question 3"));
        assert!(!prompt.contains("question 1"));
    }

    #[tokio::test]
    async fn test_no_grounding_marker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording {
            reply: Some("Not sure."),
            seen: Arc::clone(&seen),
        })]);
        s.synthesize("anything", &[], SynthesisContext::default()).await;
        assert!(seen.lock().unwrap().join("\n").contains("No grounding found"));
    }

    #[tokio::test]
    async fn test_summary_prompt_names_source_and_query() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording {
            reply: Some("Heaps keep the smallest key on top."),
            seen: Arc::clone(&seen),
        })]);
        let summary = s
            .summarize("what is a heap", SourceKind::Corpus, &[Fragment::corpus("A heap is a tree.", 0.7)])
            .await;

        assert_eq!(summary.text, "Heaps keep the smallest key on top.");
        assert!(!summary.templated);
        let prompt = seen.lock().unwrap().join("\n");
        assert!(prompt.contains("Content from course materials:\nA heap is a tree."));
        assert!(prompt.contains("Summarize in 1-2 sentences for query: \"what is a heap\""));
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_best_fragments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording { reply: None, seen })]);
        let fragments = vec![
            Fragment::web("third", 0.1, None),
            Fragment::web("first", 0.9, None),
            Fragment::web("second", 0.5, None),
        ];
        let summary = s.summarize("news", SourceKind::Web, &fragments).await;

        assert!(summary.templated);
        assert_eq!(summary.text, "first second");
    }

    #[tokio::test]
    async fn test_summary_replaces_fragments_in_answer_prompt() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = synthesizer(vec![Box::new(Recording {
            reply: Some("Acme raised money."),
            seen: Arc::clone(&seen),
        })]);
        let fragments = vec![Fragment::web(
            "Acme raised a Series B in a long press release.",
            0.8,
            Some("https://a.example".to_string()),
        )];
        let summaries = vec![SourceSummary {
            source: SourceKind::Web,
            text: "Acme closed a Series B.".to_string(),
            templated: false,
        }];
        s.synthesize(
            "how much did acme raise",
            &fragments,
            SynthesisContext {
                summaries: &summaries,
                ..SynthesisContext::default()
            },
        )
        .await;

        let prompt = seen.lock().unwrap().join("\n");
        assert!(prompt.contains("From research:\nAcme closed a Series B."));
        assert!(prompt.contains("https://a.example"));
        assert!(!prompt.contains("long press release"));
    }
}
