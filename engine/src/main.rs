// Labbot measurement-error assistant
// Main entry point for the labbot binary

use clap::Parser;
use labbot_engine::cli::{Cli, Command};
use labbot_engine::config::Config;
use labbot_engine::handlers::{
    handle_bot, handle_chat, handle_history, handle_init_db, handle_show, OutputFormat,
};
use labbot_engine::telemetry::{init_telemetry_with_level, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // An explicit --log level wins over the config file
    if let Some(level) = &cli.log {
        init_telemetry_with_level(level, LogFormat::for_build());
    }

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Config-driven log level (no-op if --log already installed a subscriber)
    init_telemetry_with_level(&config.core.log_level, LogFormat::for_build());

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Labbot v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Chat { sender } => {
            tracing::info!("Starting chat session for {}", sender);
            handle_chat(sender, &config).await
        }

        Command::Bot => {
            tracing::info!("Starting Telegram bot...");
            handle_bot(&config).await
        }

        Command::History { limit, sender } => handle_history(limit, sender, &config, format).await,

        Command::Show { run_id } => handle_show(run_id, &config, format).await,

        Command::InitDb => handle_init_db(&config, format).await,
    }
}
