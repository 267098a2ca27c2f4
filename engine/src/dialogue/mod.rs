//! Conversation layer
//!
//! - [`MeasurementMachine`]: the stateless measurement-collection state machine
//! - [`DialogueRunner`]: routes messages to steps, owns the per-session slots
//!   and runs follow-up steps within the same turn
//! - [`Lexicon`] and [`Messages`]: injected vocabulary and message catalogue

use sdk::types::{Phase, Slots};
use serde::{Deserialize, Serialize};

pub mod lexicon;
pub mod machine;
pub mod messages;
pub mod report;
pub mod runner;

pub use lexicon::Lexicon;
pub use machine::MeasurementMachine;
pub use messages::{Language, Messages};
pub use report::{format_general, format_shortest};
pub use runner::{DialogueRunner, SessionStore};

/// Per-session state passed into every state machine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Conversation / sender id
    pub sender_id: String,
    /// Current phase
    pub phase: Phase,
    /// Slot values
    pub slots: Slots,
}

impl SessionContext {
    /// Fresh session awaiting measurements
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            phase: Phase::default(),
            slots: Slots::default(),
        }
    }
}
