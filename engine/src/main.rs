// Genie meeting assistant
// Main entry point for the genie binary

use clap::Parser;
use genie_engine::cli::{Cli, Command, SecretAction};
use genie_engine::config::Config;
use genie_engine::handlers::{
    handle_ask, handle_chat, handle_doctor, handle_meetings, handle_secret_delete,
    handle_secret_set, OutputFormat,
};
use genie_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use sdk::errors::GenieErrorExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let loaded = match &cli.config {
        Some(config_path) => Config::load_from_path(config_path),
        None => Config::load_or_create(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            init_telemetry();
            tracing::error!("{}", e);
            anyhow::bail!("{} ({})", e.user_hint(), e);
        }
    };

    // --log wins over the config level; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Genie v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Chat { meeting } => {
            tracing::info!("Starting chat session");
            handle_chat(meeting, &config, format).await
        }

        Command::Ask { text, meeting } => {
            tracing::debug!("Single turn: {}", text);
            handle_ask(text, meeting, &config, format).await
        }

        Command::Meetings => handle_meetings(&config, format).await,

        Command::Secret { action } => match action {
            SecretAction::Set { name } => handle_secret_set(name),
            SecretAction::Delete { name } => handle_secret_delete(name),
        },

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
