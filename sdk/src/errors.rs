//! Error types and handling
//!
//! This module provides the error types used throughout the Labbot engine.
//! All errors implement the `LabErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Safety of messages
//!
//! Hints never echo the failing value or internal paths, so they are safe to
//! send back over a chat transport.

use thiserror::Error;

/// Trait for Labbot error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait LabErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors leave the session usable: the user can correct the
    /// input or simply retry the calculation step.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Input**: Missing or unusable measurement data
/// - **Dialogue**: Session bookkeeping problems
/// - **Transport**: Chat transport failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, LabErrorExt};
///
/// let error = EngineError::EmptyMeasurements;
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad log level".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // Input errors
    #[error("No measurement values to process")]
    EmptyMeasurements,

    #[error("Instrument error is not a number: {0}")]
    InvalidInstrumentError(String),

    // Dialogue errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Follow-up chain exceeded {0} steps")]
    FollowUpLimitExceeded(usize),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),
}

impl LabErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            Self::EmptyMeasurements => "Send your measurements first, e.g. 10.1 10.2 10.0 10.3",
            Self::InvalidInstrumentError(_) => "Instrument error must be a number, e.g. 0.01",

            Self::SessionNotFound(_) => "Start a new calculation by sending your measurements",
            Self::FollowUpLimitExceeded(_) => "Something went wrong. Send /reset to start over",

            Self::Transport(_) => "Message delivery failed. Check your connection",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::PathCanonicalization(_, _) => false,
            _ => true,
        }
    }
}
