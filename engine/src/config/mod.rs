//! Configuration management
//!
//! This module handles loading, validation, and management of the Genie configuration.
//! Configuration is stored in TOML format at ~/.genie/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level, meetings file and write-through
//! - **user**: Identity of the person the assistant schedules for
//! - **llm**: LLM provider settings and timeouts
//! - **retrieval**: Corpus and web search backends, relevance thresholds
//! - **scheduler**: Defaults applied when a request leaves fields out
//!
//! API keys are never stored here. See [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use genie_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Meetings file: {:?}", config.meetings_path());
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// The person using the assistant
    #[serde(default)]
    pub user: UserConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Retrieval backends
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Scheduling defaults
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Meetings file, relative to `data_dir` unless absolute
    #[serde(default = "default_meetings_file")]
    pub meetings_file: PathBuf,

    /// Write the store back to `meetings_file` after every commit
    #[serde(default = "default_true")]
    pub persist: bool,
}

/// Identity used for organizer checks and new meeting participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_name")]
    pub name: String,

    #[serde(default = "default_user_email")]
    pub email: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openrouter, ollama)
    pub default_provider: String,

    /// Per-call timeout for cloud providers, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Per-call timeout for local providers, in seconds
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,

    /// OpenRouter provider settings
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenRouter provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    #[serde(default = "default_openrouter_model")]
    pub model: String,
    // Note: API key stored in OS keychain or OPENROUTER_API_KEY, not in config
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Retrieval backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory of plain-text documents used by the local overlap index
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Remote corpus search server. When unset only the local index is used.
    #[serde(default)]
    pub rag_server_url: Option<String>,

    /// Web search API base URL
    #[serde(default = "default_web_search_url")]
    pub web_search_url: String,

    /// Timeout for every corpus/web call, in seconds
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Result limit on the first pass
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Corpus relevance threshold on the first pass (0.0-1.0)
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,

    /// Result limit after a relaxed re-plan
    #[serde(default = "default_relaxed_top_k")]
    pub relaxed_top_k: usize,

    /// Corpus relevance threshold after a relaxed re-plan (0.0-1.0)
    #[serde(default = "default_relaxed_threshold")]
    pub relaxed_threshold: f32,

    /// Best score a backend must reach for its results to count as sufficient
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Conversation turns handed to the synthesizer
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

/// Scheduler defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,

    #[serde(default = "default_location")]
    pub default_location: String,

    /// Offset applied to clock times typed by the user ("at 2pm")
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.genie/data")
}

fn default_meetings_file() -> PathBuf {
    PathBuf::from("meetings.json")
}

fn default_user_name() -> String {
    "You".to_string()
}

fn default_user_email() -> String {
    "me@localhost".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_local_timeout() -> u64 {
    120
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("~/.genie/corpus")
}

fn default_web_search_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_top_k() -> usize {
    3
}

fn default_relevance_threshold() -> f32 {
    0.3
}

fn default_relaxed_top_k() -> usize {
    8
}

fn default_relaxed_threshold() -> f32 {
    0.1
}

fn default_min_relevance() -> f32 {
    0.2
}

fn default_history_turns() -> usize {
    8
}

fn default_duration_minutes() -> i64 {
    30
}

fn default_location() -> String {
    "TBD".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            email: default_user_email(),
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            model: default_openrouter_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_dir: default_corpus_dir(),
            rag_server_url: None,
            web_search_url: default_web_search_url(),
            backend_timeout_secs: default_backend_timeout(),
            top_k: default_top_k(),
            relevance_threshold: default_relevance_threshold(),
            relaxed_top_k: default_relaxed_top_k(),
            relaxed_threshold: default_relaxed_threshold(),
            min_relevance: default_min_relevance(),
            history_turns: default_history_turns(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            default_location: default_location(),
            utc_offset_minutes: 0,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.genie/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails or
    /// validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable ~ paths
        let defaults = Self::default_config();
        let toml_string = toml::to_string_pretty(&defaults)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = defaults;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.genie/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".genie").join("config.toml"))
    }

    /// Built-in configuration, before path expansion
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
                meetings_file: default_meetings_file(),
                persist: true,
            },
            user: UserConfig::default(),
            llm: LLMConfig {
                default_provider: "openrouter".to_string(),
                timeout_secs: default_llm_timeout(),
                local_timeout_secs: default_local_timeout(),
                openrouter: OpenRouterConfig::default(),
                ollama: OllamaConfig::default(),
            },
            retrieval: RetrievalConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Absolute path of the meetings file
    pub fn meetings_path(&self) -> PathBuf {
        if self.core.meetings_file.is_absolute() {
            self.core.meetings_file.clone()
        } else {
            self.core.data_dir.join(&self.core.meetings_file)
        }
    }

    /// Validate values that do not touch the filesystem
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openrouter", "ollama"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 || self.llm.local_timeout_secs == 0 {
            return Err(EngineError::Config(
                "LLM timeouts must be at least 1 second".to_string(),
            ));
        }

        let r = &self.retrieval;
        for (name, value) in [
            ("relevance_threshold", r.relevance_threshold),
            ("relaxed_threshold", r.relaxed_threshold),
            ("min_relevance", r.min_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }
        if r.top_k == 0 {
            return Err(EngineError::Config("top_k must be at least 1".to_string()));
        }
        if r.relaxed_threshold > r.relevance_threshold || r.relaxed_top_k < r.top_k {
            return Err(EngineError::Config(
                "relaxed retrieval settings must not be stricter than the first pass".to_string(),
            ));
        }
        if r.backend_timeout_secs == 0 {
            return Err(EngineError::Config(
                "backend_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.scheduler.default_duration_minutes <= 0 {
            return Err(EngineError::Config(
                "default_duration_minutes must be positive".to_string(),
            ));
        }
        if self.scheduler.utc_offset_minutes.abs() > 14 * 60 {
            return Err(EngineError::Config(
                "utc_offset_minutes must be within +/- 14 hours".to_string(),
            ));
        }

        if self.user.email.trim().is_empty() {
            return Err(EngineError::Config("user.email must not be empty".to_string()));
        }

        Ok(())
    }

    /// Validate, expand ~ in paths and create the data directory
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.core.meetings_file = expand_path(&self.core.meetings_file)?;
        self.retrieval.corpus_dir = expand_path(&self.retrieval.corpus_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
