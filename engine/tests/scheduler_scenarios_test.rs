//! End-to-end scheduling conversations through the Assistant
//!
//! Every test runs against an in-memory store, a fixed clock
//! (Thu 2025-11-20 09:00 UTC) and no LLM providers, so intent analysis
//! and proposals come from the heuristic paths.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use genie_engine::assistant::{Assistant, AssistantReply};
use genie_engine::clock::{Clock, FixedClock};
use genie_engine::conductor::{Evaluator, Executor, FetchParams, Planner, RetrievalAgent};
use genie_engine::config::Config;
use genie_engine::llm::router::LLMRouter;
use genie_engine::retrieval::{CorpusChain, CorpusSearch, TokenOverlapIndex};
use genie_engine::scheduler::{SchedulerAgent, SchedulerReply, SchedulerStatus, SchedulingIssue};
use genie_engine::session::TurnKind;
use genie_engine::store::MeetingStore;
use genie_engine::synthesizer::AnswerSynthesizer;
use sdk::types::{Meeting, Participant};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, hour, minute, 0).unwrap()
}

fn meeting(id: &str, title: &str, start: DateTime<Utc>, minutes: i64, organizer: &str) -> Meeting {
    let name = organizer.split('@').next().unwrap_or(organizer);
    Meeting {
        meeting_id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        location: "Room 101".to_string(),
        start_time: start,
        end_time: start + Duration::minutes(minutes),
        participants: vec![Participant::organizer(organizer, name)],
    }
}

fn assistant(meetings: Vec<Meeting>) -> Assistant {
    let mut config = Config::default_config();
    config.user.email = "me@uni.edu".to_string();
    config.user.name = "Me".to_string();

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now()));
    let offset = genie_engine::clock::offset_from_minutes(0);
    let llm = Arc::new(LLMRouter::new(vec![], Arc::new(config.llm.clone())));
    let store = Arc::new(MeetingStore::in_memory(meetings).unwrap());

    let index = Arc::new(TokenOverlapIndex::from_documents(Vec::<String>::new()));
    let corpus = Arc::new(CorpusChain::new(
        vec![Arc::clone(&index) as Arc<dyn CorpusSearch>],
        std::time::Duration::from_secs(1),
    ));
    let params = FetchParams {
        top_k: 3,
        threshold: 0.3,
    };
    let relaxed = FetchParams {
        top_k: 8,
        threshold: 0.1,
    };
    let retrieval = RetrievalAgent::new(
        Planner::new(Arc::clone(&llm), Some(index), params),
        Executor::new(corpus, None, std::time::Duration::from_secs(1)),
        Evaluator::new(0.2, relaxed),
        AnswerSynthesizer::new(Arc::clone(&llm), 8, Arc::clone(&clock), offset),
        8,
    );
    let scheduler = SchedulerAgent::new(llm, Arc::clone(&clock), &config.user, &config.scheduler);
    Assistant::new(scheduler, retrieval, store, clock)
}

async fn say(assistant: &Assistant, session: &str, text: &str) -> SchedulerReply {
    match assistant.handle(session, text).await.unwrap() {
        AssistantReply::Schedule(reply) => reply,
        AssistantReply::Answer(answer) => panic!("'{}' went to retrieval: {}", text, answer.answer),
    }
}

#[tokio::test]
async fn test_conflict_names_organizer_and_offers_replace() {
    let assistant = assistant(vec![meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu")]);
    let session = assistant.create_session(None).await.unwrap();

    let reply = say(&assistant, &session, "book a call at 10:15 for 30 minutes").await;

    assert_eq!(reply.status, SchedulerStatus::Clarify);
    assert_eq!(reply.issue, Some(SchedulingIssue::Conflict));
    assert_eq!(reply.conflicts.len(), 1);
    assert!(reply.message.contains("alice@uni.edu"));
    assert!(reply.message.contains("not the organizer"));
    assert!(reply.message.contains("replace"));
    assert_eq!(assistant.list_meetings().await.len(), 1);
}

#[tokio::test]
async fn test_schedule_then_confirm() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let proposal = say(&assistant, &session, "schedule a sync tomorrow at 2pm").await;
    assert_eq!(proposal.status, SchedulerStatus::Pending);
    let proposed = proposal.meeting.clone().unwrap();
    assert_eq!(
        proposed.start_time,
        Utc.with_ymd_and_hms(2025, 11, 21, 14, 0, 0).unwrap()
    );
    assert_eq!(proposed.end_time - proposed.start_time, Duration::minutes(30));
    assert!(proposed.is_organized_by("me@uni.edu"));
    assert!(assistant.list_meetings().await.is_empty());

    let confirmed = say(&assistant, &session, "yes").await;
    assert_eq!(confirmed.status, SchedulerStatus::Confirmed);

    let stored = assistant.list_meetings().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], proposed);

    let phases: Vec<&str> = confirmed.trace.phases();
    assert_eq!(phases, vec!["commit"]);
}

#[tokio::test]
async fn test_second_yes_is_a_no_op() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "schedule a sync tomorrow at 2pm").await;
    say(&assistant, &session, "yes").await;
    let again = say(&assistant, &session, "yes").await;

    assert_eq!(again.issue, Some(SchedulingIssue::NothingPending));
    assert_eq!(assistant.list_meetings().await.len(), 1);
}

#[tokio::test]
async fn test_past_time_rejected_and_store_unchanged() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let reply = say(&assistant, &session, "schedule a review today at 8am").await;

    assert_eq!(reply.status, SchedulerStatus::Rejected);
    assert_eq!(reply.issue, Some(SchedulingIssue::PastTimeRejected));
    assert!(reply.message.contains("8:00 AM"));
    assert!(assistant.list_meetings().await.is_empty());

    // nothing was staged, so a "yes" has nothing to commit
    let yes = say(&assistant, &session, "yes").await;
    assert_eq!(yes.issue, Some(SchedulingIssue::NothingPending));
    assert!(assistant.list_meetings().await.is_empty());
}

#[tokio::test]
async fn test_back_to_back_is_not_a_conflict() {
    let assistant = assistant(vec![meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu")]);
    let session = assistant.create_session(None).await.unwrap();

    let reply = say(&assistant, &session, "schedule a sync today at 10:30").await;
    assert_eq!(reply.status, SchedulerStatus::Pending);

    say(&assistant, &session, "yes").await;
    assert_eq!(assistant.list_meetings().await.len(), 2);
}

#[tokio::test]
async fn test_decline_clears_proposal() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "schedule a sync tomorrow at 2pm").await;
    let declined = say(&assistant, &session, "no").await;
    assert_eq!(declined.status, SchedulerStatus::Rejected);
    assert_eq!(declined.issue, Some(SchedulingIssue::Declined));
    assert!(assistant.list_meetings().await.is_empty());
}

#[tokio::test]
async fn test_replace_single_conflict() {
    let assistant = assistant(vec![meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu")]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "book a call at 10:15 for 30 minutes").await;
    let proposal = say(&assistant, &session, "replace").await;
    assert_eq!(proposal.status, SchedulerStatus::Pending);
    assert!(proposal.message.contains("This will replace: Standup"));

    let confirmed = say(&assistant, &session, "yes").await;
    assert_eq!(confirmed.status, SchedulerStatus::Confirmed);
    assert!(confirmed.message.contains("(Replaced 'Standup')"));

    let stored = assistant.list_meetings().await;
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].meeting_id, "m_alice");
    assert_eq!(stored[0].start_time, at(10, 15));
}

#[tokio::test]
async fn test_replace_with_several_conflicts_asks_which() {
    let assistant = assistant(vec![
        meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu"),
        meeting("m_bob", "Design Review", at(10, 30), 30, "bob@uni.edu"),
    ]);
    let session = assistant.create_session(None).await.unwrap();

    let conflict = say(&assistant, &session, "book a call at 10:15 for 30 minutes").await;
    assert_eq!(conflict.conflicts.len(), 2);
    assert!(conflict.message.contains("replace one of them"));

    let which = say(&assistant, &session, "replace").await;
    assert_eq!(which.issue, Some(SchedulingIssue::AmbiguousReference));
    assert!(which.message.contains("1. Standup"));
    assert!(which.message.contains("2. Design Review"));

    let unmatched = say(&assistant, &session, "the purple one").await;
    assert_eq!(unmatched.issue, Some(SchedulingIssue::AmbiguousReference));

    // replacing the review still collides with the standup
    let still = say(&assistant, &session, "2").await;
    assert_eq!(still.issue, Some(SchedulingIssue::Conflict));
    assert_eq!(still.conflicts.len(), 1);
    assert_eq!(still.conflicts[0].meeting_id, "m_alice");
}

#[tokio::test]
async fn test_replace_by_title_inline() {
    let assistant = assistant(vec![
        meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu"),
        meeting("m_bob", "Design Review", at(10, 20), 10, "bob@uni.edu"),
    ]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "book a call at 10:15 for 10 minutes").await;
    // picking the standup by title leaves only the review in the way
    let reply = say(&assistant, &session, "replace Standup").await;
    assert_eq!(reply.status, SchedulerStatus::Clarify);
    assert_eq!(reply.issue, Some(SchedulingIssue::Conflict));
    assert_eq!(reply.conflicts.len(), 1);
    assert_eq!(reply.conflicts[0].meeting_id, "m_bob");
}

#[tokio::test]
async fn test_another_time_drops_offer() {
    let assistant = assistant(vec![meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu")]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "book a call at 10:15 for 30 minutes").await;
    let reply = say(&assistant, &session, "let's pick another time").await;
    assert_eq!(reply.status, SchedulerStatus::Clarify);
    assert!(reply.issue.is_none());

    let retry = say(&assistant, &session, "schedule a call today at 11am").await;
    assert_eq!(retry.status, SchedulerStatus::Pending);
}

#[tokio::test]
async fn test_date_without_time_asks_then_completes() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let ask = say(&assistant, &session, "schedule a sync tomorrow").await;
    assert_eq!(ask.issue, Some(SchedulingIssue::NeedsTime));

    let proposal = say(&assistant, &session, "at 3pm").await;
    assert_eq!(proposal.status, SchedulerStatus::Pending);
    assert_eq!(
        proposal.meeting.unwrap().start_time,
        Utc.with_ymd_and_hms(2025, 11, 21, 15, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_new_request_replaces_draft() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let ask = say(&assistant, &session, "schedule a sync tomorrow").await;
    assert_eq!(ask.issue, Some(SchedulingIssue::NeedsTime));

    let proposal = say(&assistant, &session, "schedule lunch with Bob on friday at noon").await;
    assert_eq!(proposal.status, SchedulerStatus::Pending);
    let meeting = proposal.meeting.unwrap();
    assert!(meeting.title.contains("Lunch"));
    assert!(meeting.participants.iter().any(|p| p.name == "Bob"));
    assert_eq!(
        meeting.start_time,
        Utc.with_ymd_and_hms(2025, 11, 21, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_follow_up_day_overrides_draft_day() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    say(&assistant, &session, "schedule a sync tomorrow").await;
    let proposal = say(&assistant, &session, "monday at 3pm").await;

    let meeting = proposal.meeting.unwrap();
    assert_eq!(meeting.title, "Sync");
    assert_eq!(
        meeting.start_time,
        Utc.with_ymd_and_hms(2025, 11, 24, 15, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_numeric_and_relative_dates_are_honoured() {
    let assistant = assistant(vec![]);

    let session = assistant.create_session(None).await.unwrap();
    let proposal = say(&assistant, &session, "schedule a sync on 12/5 at 3pm").await;
    assert_eq!(
        proposal.meeting.unwrap().start_time,
        Utc.with_ymd_and_hms(2025, 12, 5, 15, 0, 0).unwrap()
    );

    let session = assistant.create_session(None).await.unwrap();
    let proposal = say(&assistant, &session, "schedule a sync in 2 days at 3pm").await;
    assert_eq!(
        proposal.meeting.unwrap().start_time,
        Utc.with_ymd_and_hms(2025, 11, 22, 15, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_vague_day_asks_which_date() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let ask = say(&assistant, &session, "schedule a sync next week at 3pm").await;
    assert_eq!(ask.status, SchedulerStatus::Clarify);
    assert_eq!(ask.issue, Some(SchedulingIssue::UnclearDate));
    assert!(ask.message.contains("next week"));
    assert!(ask.meeting.is_none());
    assert!(assistant.list_meetings().await.is_empty());

    let proposal = say(&assistant, &session, "on tuesday").await;
    assert_eq!(proposal.status, SchedulerStatus::Pending);
    assert_eq!(
        proposal.meeting.unwrap().start_time,
        Utc.with_ymd_and_hms(2025, 11, 25, 15, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_time_for_vague_day_asks_for_the_day_again() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let ask = say(&assistant, &session, "schedule a sync next week").await;
    assert_eq!(ask.issue, Some(SchedulingIssue::UnclearDate));

    let again = say(&assistant, &session, "at 4pm").await;
    assert_eq!(again.issue, Some(SchedulingIssue::UnclearDate));

    let proposal = say(&assistant, &session, "wednesday").await;
    assert_eq!(
        proposal.meeting.unwrap().start_time,
        Utc.with_ymd_and_hms(2025, 11, 26, 16, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_two_sessions_cannot_double_book() {
    let assistant = Arc::new(assistant(vec![]));
    let first = assistant.create_session(None).await.unwrap();
    let second = assistant.create_session(None).await.unwrap();

    for session in [&first, &second] {
        let reply = say(&assistant, session, "schedule a sync tomorrow at 2pm").await;
        assert_eq!(reply.status, SchedulerStatus::Pending);
    }

    let (a, b) = tokio::join!(
        say(&assistant, &first, "yes"),
        say(&assistant, &second, "yes")
    );
    let confirmed = [&a, &b]
        .iter()
        .filter(|r| r.status == SchedulerStatus::Confirmed)
        .count();
    assert_eq!(confirmed, 1);
    assert!([&a, &b].iter().any(|r| r.issue == Some(SchedulingIssue::Conflict)));
    assert_eq!(assistant.list_meetings().await.len(), 1);
}

#[tokio::test]
async fn test_questions_go_to_retrieval_and_are_recorded() {
    let assistant = assistant(vec![]);
    let session = assistant.create_session(None).await.unwrap();

    let reply = assistant
        .handle(&session, "what is gradient descent?")
        .await
        .unwrap();
    assert!(matches!(reply, AssistantReply::Answer(_)));
    assert!(!reply.text().is_empty());
    assert_eq!(reply.kind(), TurnKind::None);

    let reply = assistant.handle(&session, "yes").await.unwrap();
    assert!(matches!(reply, AssistantReply::Answer(_)));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let assistant = assistant(vec![meeting("m_alice", "Standup", at(10, 0), 30, "alice@uni.edu")]);

    assert!(assistant.create_session(Some("missing")).await.is_err());
    let session = assistant.create_session(Some("m_alice")).await.unwrap();
    assert!(session.starts_with("meeting_"));

    assert!(assistant.destroy_session(&session).await);
    assert!(assistant.handle(&session, "hello").await.is_err());
}
