//! Labbot Engine Library
//!
//! Measurement-error dialogue: number extraction, error statistics, the
//! conversation state machine and run persistence. It is used by both the
//! main binary and integration tests.

/// Configuration management module
pub mod config;

/// Numeric token extraction
pub mod extractor;

/// Measurement statistics and error propagation
pub mod stats;

/// Database persistence module
pub mod db;

/// Conversation state machine and runner
pub mod dialogue;

/// Telegram bot module
pub mod bot;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
