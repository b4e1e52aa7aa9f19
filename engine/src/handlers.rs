//! Command handlers for CLI operations
//!
//! This module wires the engine together from a [`Config`] and implements
//! the handlers for all CLI commands:
//! - chat: interactive conversation over stdin
//! - ask: a single turn in a fresh session
//! - meetings: list the calendar
//! - secret: store or delete API keys
//! - doctor: validate configuration and check backends

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::assistant::{Assistant, AssistantReply};
use crate::cli::SecretName;
use crate::clock::{format_local, format_local_time, offset_from_minutes, Clock, SystemClock};
use crate::conductor::{Evaluator, Executor, FetchParams, Planner, RetrievalAgent};
use crate::config::Config;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openrouter::OpenRouterProvider;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::retrieval::{
    CalendarLookup, CorpusChain, CorpusSearch, RagServerSearch, TavilySearch, TokenOverlapIndex,
    WebSearch,
};
use crate::scheduler::SchedulerAgent;
use crate::secrets::{SecretManager, OPENROUTER_API_KEY, WEB_SEARCH_API_KEY};
use crate::store::{JsonFileSink, MeetingStore, SnapshotSink};
use crate::synthesizer::AnswerSynthesizer;

/// Keychain service name
pub const SERVICE_NAME: &str = "genie";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// LLM providers in failover order: OpenRouter when a key is available,
/// then the local Ollama model.
pub fn build_llm(config: &Config, secrets: &SecretManager) -> LLMRouter {
    let mut providers: Vec<Box<dyn LLMProvider>> = Vec::new();
    match secrets.lookup(OPENROUTER_API_KEY) {
        Some(key) => providers.push(Box::new(OpenRouterProvider::new(
            config.llm.openrouter.clone(),
            Some(key),
        ))),
        None => tracing::info!("No OpenRouter key configured, using Ollama only"),
    }
    providers.push(Box::new(OllamaProvider::new(
        config.llm.ollama.base_url.clone(),
        config.llm.ollama.model.clone(),
    )));
    LLMRouter::new(providers, Arc::new(config.llm.clone()))
}

/// Open the meeting store, file-backed unless `core.persist` is off
pub async fn build_store(config: &Config) -> Result<MeetingStore> {
    let sink = Arc::new(JsonFileSink::new(config.meetings_path()));
    if config.core.persist {
        MeetingStore::open(sink)
            .await
            .with_context(|| format!("Failed to open {:?}", config.meetings_path()))
    } else {
        // Read once, never write back
        let meetings = sink.load().await?;
        Ok(MeetingStore::in_memory(meetings)?)
    }
}

/// Local overlap index over `retrieval.corpus_dir`; an unreadable directory
/// yields an empty index.
pub fn load_corpus_index(config: &Config) -> Arc<TokenOverlapIndex> {
    let dir = &config.retrieval.corpus_dir;
    match TokenOverlapIndex::load_dir(dir) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            tracing::warn!("Corpus directory {:?} unavailable: {}", dir, e);
            Arc::new(TokenOverlapIndex::from_documents(Vec::<String>::new()))
        }
    }
}

/// Build the assistant with every backend the config names
pub async fn build_assistant(config: &Config) -> Result<Assistant> {
    let secrets = SecretManager::new(SERVICE_NAME);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let offset = offset_from_minutes(config.scheduler.utc_offset_minutes);
    let llm = Arc::new(build_llm(config, &secrets));
    let store = Arc::new(build_store(config).await?);

    let r = &config.retrieval;
    let timeout = Duration::from_secs(r.backend_timeout_secs);
    let index = load_corpus_index(config);
    let mut links: Vec<Arc<dyn CorpusSearch>> = Vec::new();
    if let Some(url) = &r.rag_server_url {
        links.push(Arc::new(RagServerSearch::new(url.clone())));
    }
    links.push(Arc::clone(&index) as Arc<dyn CorpusSearch>);
    let corpus = Arc::new(CorpusChain::new(links, timeout));

    let web: Arc<dyn WebSearch> = Arc::new(TavilySearch::new(
        r.web_search_url.clone(),
        secrets.lookup(WEB_SEARCH_API_KEY),
    ));

    let first_pass = FetchParams {
        top_k: r.top_k,
        threshold: r.relevance_threshold,
    };
    let relaxed = FetchParams {
        top_k: r.relaxed_top_k,
        threshold: r.relaxed_threshold,
    };

    let retrieval = RetrievalAgent::new(
        Planner::new(Arc::clone(&llm), Some(index), first_pass),
        Executor::new(corpus, Some(web), timeout),
        Evaluator::new(r.min_relevance, relaxed),
        AnswerSynthesizer::new(Arc::clone(&llm), r.history_turns, Arc::clone(&clock), offset),
        r.history_turns,
    )
    .with_calendar(CalendarLookup::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        offset,
    ));

    let scheduler = SchedulerAgent::new(
        Arc::clone(&llm),
        Arc::clone(&clock),
        &config.user,
        &config.scheduler,
    );

    Ok(Assistant::new(scheduler, retrieval, store, clock))
}

fn print_reply(reply: &AssistantReply, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", reply.text());
            if let AssistantReply::Answer(answer) = reply {
                if answer.degraded {
                    println!("(some sources were unavailable)");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reply)?),
    }
    Ok(())
}

/// Single turn in a fresh session
pub async fn handle_ask(
    text: String,
    meeting: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let assistant = build_assistant(config).await?;
    let session = assistant.create_session(meeting.as_deref()).await?;
    let reply = assistant.handle(&session, &text).await?;
    print_reply(&reply, format)?;
    assistant.destroy_session(&session).await;
    Ok(())
}

/// Interactive conversation. One session, one utterance at a time.
///
/// `/reload` re-reads the meetings file, `/quit` (or EOF) ends the session.
pub async fn handle_chat(meeting: Option<String>, config: &Config, format: OutputFormat) -> Result<()> {
    let assistant = build_assistant(config).await?;
    let session = assistant.create_session(meeting.as_deref()).await?;
    tracing::info!(session = %session, "Chat started");

    if matches!(format, OutputFormat::Text) {
        println!("Genie is ready. Ask a question or schedule a meeting. /quit to exit.");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if matches!(format, OutputFormat::Text) {
            print!("> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let text = line.trim();
        match text {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reload" => {
                match assistant.reload_meetings().await {
                    Ok(count) => println!("Reloaded {} meetings.", count),
                    Err(e) => println!("Reload failed: {}", e),
                }
                continue;
            }
            _ => {}
        }

        let reply = assistant.handle(&session, text).await?;
        print_reply(&reply, format)?;
    }

    assistant.destroy_session(&session).await;
    Ok(())
}

/// List the meetings on the calendar
pub async fn handle_meetings(config: &Config, format: OutputFormat) -> Result<()> {
    let store = build_store(config).await?;
    let meetings = store.list().await;
    let offset = offset_from_minutes(config.scheduler.utc_offset_minutes);

    match format {
        OutputFormat::Text => {
            if meetings.is_empty() {
                println!("No meetings scheduled.");
                return Ok(());
            }
            for m in &meetings {
                println!(
                    "{}  {} - {}  {}",
                    m.meeting_id,
                    format_local(m.start_time, offset),
                    format_local_time(m.end_time, offset),
                    m.title
                );
                if let Some(organizer) = m.organizer() {
                    println!("    Organizer: {}  Location: {}", organizer.display(), m.location);
                }
            }
            println!();
            println!("{} meeting(s).", meetings.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "meetings": meetings }))?);
        }
    }
    Ok(())
}

fn secret_key(name: SecretName) -> &'static str {
    match name {
        SecretName::Openrouter => OPENROUTER_API_KEY,
        SecretName::Tavily => WEB_SEARCH_API_KEY,
    }
}

/// Store a key read from stdin in the OS keychain
pub fn handle_secret_set(name: SecretName) -> Result<()> {
    let key = secret_key(name);
    eprint!("Enter value for {}: ", key);
    io::stderr().flush()?;
    let mut value = String::new();
    io::stdin().lock().read_line(&mut value)?;
    SecretManager::new(SERVICE_NAME)
        .set_secret(key, &value)
        .with_context(|| format!("Failed to store {}", key))?;
    println!("Stored {} in the system keychain.", key);
    Ok(())
}

pub fn handle_secret_delete(name: SecretName) -> Result<()> {
    let key = secret_key(name);
    SecretManager::new(SERVICE_NAME)
        .delete_secret(key)
        .with_context(|| format!("Failed to delete {}", key))?;
    println!("Deleted {} from the system keychain.", key);
    Ok(())
}

/// Run system diagnostics
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let secrets = SecretManager::new(SERVICE_NAME);
    let llm = build_llm(config, &secrets);
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid".to_string()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory", "Exists".to_string()));
    } else {
        checks.push(("Data directory", "Missing".to_string()));
        issues.push(format!("Data directory does not exist: {:?}", config.core.data_dir));
    }

    let meetings_path = config.meetings_path();
    if meetings_path.exists() {
        match build_store(config).await {
            Ok(store) => {
                checks.push(("Meetings file", format!("{} meetings", store.list().await.len())));
            }
            Err(e) => {
                checks.push(("Meetings file", "Unreadable".to_string()));
                issues.push(format!("Cannot load {:?}: {:#}", meetings_path, e));
            }
        }
    } else {
        checks.push(("Meetings file", "Not created yet".to_string()));
    }

    let index = load_corpus_index(config);
    if index.is_empty() {
        checks.push(("Local corpus", "Empty".to_string()));
        issues.push(format!(
            "No documents in {:?}. Course questions will rely on the web.",
            config.retrieval.corpus_dir
        ));
    } else {
        checks.push((
            "Local corpus",
            format!("{} documents, {} chunks", index.document_count(), index.chunk_count()),
        ));
    }

    match &config.retrieval.rag_server_url {
        Some(url) => checks.push(("RAG server", url.clone())),
        None => checks.push(("RAG server", "Not configured".to_string())),
    }

    let web = TavilySearch::new(
        config.retrieval.web_search_url.clone(),
        secrets.lookup(WEB_SEARCH_API_KEY),
    );
    if web.has_key() {
        checks.push(("Web search API key", "Configured".to_string()));
    } else {
        checks.push(("Web search API key", "Missing".to_string()));
        issues.push("No Tavily key. Run 'genie secret set tavily' to enable web search.".to_string());
    }

    for (name, healthy) in llm.check_health().await {
        let status = if healthy { "Available" } else { "Not available" };
        checks.push((name, status.to_string()));
        if !healthy {
            issues.push(format!("LLM provider '{}' is not reachable.", name));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Genie System Diagnostics");
            println!("============================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
