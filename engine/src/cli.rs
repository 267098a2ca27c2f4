//! CLI interface for Labbot
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Labbot measurement-error assistant
///
/// Collects lab measurements and an optional instrument error over a chat,
/// computes the propagated error and stores every run.
#[derive(Parser, Debug)]
#[command(name = "labbot")]
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
    /// Chat with the assistant on stdin/stdout
    Chat {
        /// Session / sender id recorded with each run
        #[arg(short, long, default_value = "cli_user")]
        sender: String,
    },

    /// Run the Telegram bot (token from LABBOT_TELEGRAM_TOKEN)
    Bot,

    /// Show recently stored runs
    History {
        /// Number of runs to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only runs of this sender
        #[arg(long)]
        sender: Option<String>,
    },

    /// Show a stored run with its measurements and results
    Show {
        /// Run ID
        run_id: i64,
    },

    /// Create the database schema (safe to repeat)
    InitDb,
}
