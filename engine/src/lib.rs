//! Genie Engine Library
//!
//! This library provides the core functionality of the Genie meeting
//! assistant. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Injected time source
pub mod clock;

/// Execution traces shared by both agents
pub mod trace;

/// LLM provider abstraction layer
pub mod llm;

/// Meeting store and persistence
pub mod store;

/// Corpus, web and calendar retrieval backends
pub mod retrieval;

/// Retrieval planning agent
pub mod conductor;

/// Answer synthesis over retrieved fragments
pub mod synthesizer;

/// Scheduler agent
pub mod scheduler;

/// Conversation sessions
pub mod session;

/// Routing of utterances to the agents
pub mod assistant;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
