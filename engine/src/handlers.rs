//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: Interactive session on stdin/stdout
//! - bot: Telegram long-polling transport
//! - history: Show last N runs
//! - show: Show one run with measurements and results
//! - init-db: Create the schema

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use sdk::errors::LabErrorExt;

use crate::bot::TelegramBot;
use crate::config::Config;
use crate::db::{Database, RunStore};
use crate::dialogue::{DialogueRunner, MeasurementMachine, Messages};
use crate::extractor::NumericExtractor;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Messages that end the chat session
const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

/// Assemble the dialogue runner from configuration and a run store
pub fn build_runner(config: &Config, store: Arc<dyn RunStore>) -> Result<DialogueRunner> {
    let extractor = NumericExtractor::new().context("Failed to compile numeric pattern")?;

    let machine = MeasurementMachine::new(
        extractor,
        config.dialogue.lexicon(),
        Messages::new(config.dialogue.language),
        config.report.significant_digits,
        store,
    );

    Ok(
        DialogueRunner::new(machine, config.dialogue.max_follow_ups).with_session_idle(
            Duration::from_secs(config.dialogue.session_idle_secs),
        ),
    )
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.db_path())
        .await
        .context("Failed to open database")
}

/// Interactive chat on stdin/stdout
pub async fn handle_chat(sender: String, config: &Config) -> Result<()> {
    let database = open_database(config).await?;
    let runner = build_runner(config, Arc::new(database.runs()))?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    stdout
        .write_all(format!("{}\n\n", runner.machine().messages().help()).as_bytes())
        .await?;

    let turns = run_chat(&runner, &sender, stdin, &mut stdout).await?;
    tracing::info!("Chat session for {} ended after {} turns", sender, turns);

    database.close().await
}

/// Feed lines from `input` to the runner, writing replies to `output`
///
/// Blank lines are ignored. Stops at end of input or a quit command and
/// returns the number of processed turns. A recoverable dialogue error is
/// shown as its hint; any other error ends the session.
pub async fn run_chat<R, W>(
    runner: &DialogueRunner,
    sender: &str,
    input: R,
    output: &mut W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;

    output.write_all(b"> ").await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let text = line.trim();
        if QUIT_COMMANDS.contains(&text) {
            break;
        }

        if !text.is_empty() {
            turns += 1;
            let replies = match runner.handle_message(sender, text).await {
                Ok(replies) => replies,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Dialogue turn failed: {}", e);
                    vec![e.user_hint().to_string()]
                }
                Err(e) => return Err(e).context("Dialogue failed"),
            };

            for reply in replies {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
        }

        output.write_all(b"> ").await?;
        output.flush().await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(turns)
}

/// Run the Telegram bot until interrupted
pub async fn handle_bot(config: &Config) -> Result<()> {
    if !config.telegram.enabled {
        anyhow::bail!("Telegram bot is disabled. Set [telegram] enabled = true in config.toml");
    }

    let token = config.telegram_token()?;
    let database = open_database(config).await?;
    let runner = Arc::new(build_runner(config, Arc::new(database.runs()))?);

    let bot = TelegramBot::new(token, config.telegram.allowed_users.clone(), runner)
        .with_poll_timeout(config.telegram.poll_timeout_secs);

    tokio::select! {
        result = bot.start_polling() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, stopping bot");
        }
    }

    database.close().await
}

/// Show recently stored runs
pub async fn handle_history(
    limit: usize,
    sender: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = open_database(config).await?;
    let runs_repo = database.runs();

    let runs = match &sender {
        Some(sender) => runs_repo.runs_for_sender(sender, limit as i64).await,
        None => runs_repo.recent_runs(limit as i64).await,
    }
    .context("Failed to fetch run history")?;

    match format {
        OutputFormat::Text => {
            if runs.is_empty() {
                println!("No runs in history");
            } else {
                println!("Run History (last {} runs):", limit);
                println!();

                for run in &runs {
                    println!("Run ID: {}", run.id);
                    println!("  Sender: {}", run.sender_id);
                    println!(
                        "  Measurements: {}",
                        run.measurements_text.as_deref().unwrap_or("-")
                    );
                    match run.instrument_error {
                        Some(instr) => println!("  Instrument error: {}", instr),
                        None => println!("  Instrument error: -"),
                    }
                    println!("  Created: {}", run.created_at);
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "runs": runs,
                "count": runs.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    database.close().await
}

/// Show one run with its measurements and results
pub async fn handle_show(run_id: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let runs_repo = database.runs();

    let run = runs_repo
        .get_run(run_id)
        .await
        .context("Failed to fetch run")?
        .ok_or_else(|| anyhow::anyhow!("Run not found: {}", run_id))?;

    let measurements = runs_repo
        .get_measurements(run_id)
        .await
        .context("Failed to fetch measurements")?;

    let results = runs_repo
        .get_results(run_id)
        .await
        .context("Failed to fetch results")?;

    match format {
        OutputFormat::Text => {
            println!("Run {}", run.id);
            println!();
            println!("Sender: {}", run.sender_id);
            println!("Created: {}", run.created_at);
            println!(
                "Input: {}",
                run.measurements_text.as_deref().unwrap_or("-")
            );
            println!();
            println!("Measurements ({} total):", measurements.len());
            for m in &measurements {
                println!("  [{}] {}", m.idx, m.value);
            }
            println!();

            match &results {
                Some(r) => {
                    println!("Results:");
                    println!("  n = {}", r.n);
                    println!("  x̄ = {}", r.xbar);
                    println!("  s = {}", r.s);
                    println!("  s/√n = {}", r.s_mean);
                    println!("  Δ_stat = {}", r.delta_stat);
                    if r.used_instr {
                        if let Some(instr) = run.instrument_error {
                            println!("  Δ_instr = {}", instr);
                        }
                    }
                    println!("  Δ = {}", r.delta_total);
                    println!("  ε = {} %", r.rel_percent);
                }
                None => println!("No results stored for this run"),
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "run": run,
                "measurements": measurements,
                "results": results,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    database.close().await
}

/// Create the database schema
pub async fn handle_init_db(config: &Config, format: OutputFormat) -> Result<()> {
    let db_path = config.db_path();
    let database = open_database(config).await?;

    match format {
        OutputFormat::Text => println!("Database ready: {}", db_path.display()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "database": db_path, "ready": true }))?
        ),
    }

    database.close().await
}
