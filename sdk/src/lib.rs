//! Labbot SDK
//!
//! Shared library providing error and dialogue protocol types for Labbot components.
//! This crate is used by both the engine and the chat transports built on it.

/// Error types and handling
pub mod errors;

/// Dialogue protocol types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, LabErrorExt};
pub use types::{InstrumentSlot, Phase, SlotMutation, Slots, Step, TurnOutcome};
