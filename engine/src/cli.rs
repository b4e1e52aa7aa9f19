//! CLI interface for Genie
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Genie meeting assistant
///
/// Answers questions from your course materials and the web, and books
/// meetings on your calendar after checking for conflicts.
#[derive(Parser, Debug)]
#[command(name = "genie")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation
    Chat {
        /// Bind the conversation to a stored meeting
        #[arg(long, value_name = "ID")]
        meeting: Option<String>,
    },

    /// Ask a single question or make a single request
    Ask {
        /// The utterance to handle
        text: String,

        /// Bind the conversation to a stored meeting
        #[arg(long, value_name = "ID")]
        meeting: Option<String>,
    },

    /// List the meetings on the calendar
    Meetings,

    /// Manage API keys in the OS keychain
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Run system diagnostics
    Doctor,
}

/// Keys the engine knows how to use
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretName {
    Openrouter,
    Tavily,
}

/// Secret management actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a key (the value is read from stdin)
    Set { name: SecretName },

    /// Remove a stored key
    Delete { name: SecretName },
}
