use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use proptest::prelude::*;
use genie_engine::config::Config;
use genie_engine::scheduler::timeparse;
use genie_engine::store::{CommitOutcome, MeetingStore};
use sdk::types::{Meeting, Participant};

// Configuration round-trip through TOML
proptest! {
    #[test]
    fn test_config_parsing_round_trip(
        log_level in "error|warn|info|debug|trace",
        default_provider in "openrouter|ollama",
        top_k in 1..=10usize,
        threshold in 0.0..=1.0f32,
        duration in 5..=240i64,
        offset in -840..=840i32,
    ) {
        let mut config = Config::default_config();
        config.core.log_level = log_level;
        config.llm.default_provider = default_provider;
        config.retrieval.top_k = top_k;
        config.retrieval.relevance_threshold = threshold;
        config.scheduler.default_duration_minutes = duration;
        config.scheduler.utc_offset_minutes = offset;

        let toml_string = toml::to_string(&config).expect("Failed to serialize Config to string");
        let parsed: Config = toml::from_str(&toml_string).expect("Failed to deserialize TOML to Config");

        prop_assert_eq!(config.core.log_level, parsed.core.log_level);
        prop_assert_eq!(config.llm.default_provider, parsed.llm.default_provider);
        prop_assert_eq!(config.retrieval.top_k, parsed.retrieval.top_k);
        prop_assert_eq!(config.retrieval.relevance_threshold, parsed.retrieval.relevance_threshold);
        prop_assert_eq!(config.scheduler.default_duration_minutes, parsed.scheduler.default_duration_minutes);
        prop_assert_eq!(config.scheduler.utc_offset_minutes, parsed.scheduler.utc_offset_minutes);
    }
}

// Provider keys never survive scrubbing; ordinary text is left alone
proptest! {
    #[test]
    fn test_secret_scrubbing_properties(
        prefix in "[a-zA-Z0-9 ]{0,20}",
        suffix in "[a-zA-Z0-9 ]{0,20}",
        random_text in "[a-zA-Z0-9_=+]{10,50}",
    ) {
        use genie_engine::secrets::SecretManager;
        let manager = SecretManager::new("test");

        let openrouter_key = "sk-or-v1-1234567890abcdefghijklmnopqrstuvwxyz";
        let tavily_key = "tvly-ABCDEFGHIJKLMNOP1234";

        let scrubbed_openrouter = manager.scrub(&format!("{} {} {}", prefix, openrouter_key, suffix));
        let scrubbed_tavily = manager.scrub(&format!("{} {} {}", prefix, tavily_key, suffix));

        prop_assert!(!scrubbed_openrouter.contains(openrouter_key));
        prop_assert!(!scrubbed_tavily.contains(tavily_key));
        prop_assert!(scrubbed_openrouter.contains("[REDACTED]"));
        prop_assert!(scrubbed_tavily.contains("[REDACTED]"));

        let normal_text = format!("{} {} {}", prefix, random_text, suffix);
        prop_assert_eq!(manager.scrub(&normal_text), normal_text);
    }
}

fn meeting(id: usize, start_minute: i64, length: i64) -> Meeting {
    let base = Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap();
    let start = base + Duration::minutes(start_minute);
    Meeting {
        meeting_id: format!("m{}", id),
        title: format!("Meeting {}", id),
        description: String::new(),
        location: "TBD".to_string(),
        start_time: start,
        end_time: start + Duration::minutes(length),
        participants: vec![Participant::organizer("me@uni.edu", "Me")],
    }
}

// Whatever order commits arrive in, the store never holds two overlapping
// meetings, and a commit is rejected exactly when it overlaps a stored one
proptest! {
    #[test]
    fn test_commits_never_overlap(
        slots in prop::collection::vec((0..600i64, 5..120i64), 1..20),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let store = MeetingStore::in_memory(vec![]).expect("empty store");
            for (i, (start, length)) in slots.iter().enumerate() {
                let candidate = meeting(i, *start, *length);
                let clashes = store.find_conflicts(&candidate.window()).await;
                let outcome = store.commit(candidate, None).await.expect("commit");
                match outcome {
                    CommitOutcome::Committed { .. } => assert!(clashes.is_empty()),
                    CommitOutcome::Conflict(found) => assert_eq!(found, clashes),
                    CommitOutcome::AlreadyCommitted(_) => panic!("ids are unique"),
                }
            }

            let stored = store.list().await;
            for pair in stored.windows(2) {
                assert!(pair[0].end_time <= pair[1].start_time);
            }
        });
    }
}

// "at N pm" always lands in the afternoon or evening of the given day
proptest! {
    #[test]
    fn test_pm_times_parse_to_afternoon(hour in 1..=11u32, minute in 0..60u32) {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).expect("date");
        let text = format!("schedule a sync tomorrow at {}:{:02}pm", hour, minute);
        let parsed = timeparse::parse(&text, today);

        prop_assert_eq!(parsed.date, today.succ_opt());
        let start = parsed.start.expect("time");
        prop_assert_eq!(start.hour(), hour + 12);
        prop_assert_eq!(start.minute(), minute);
        prop_assert!(start > NaiveTime::from_hms_opt(12, 0, 0).expect("noon"));
    }
}
