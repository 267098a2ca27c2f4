//! Dialogue protocol types
//!
//! These types form the contract between the conversation state machine and
//! whatever layer drives it (the in-process dialogue runner, a chat transport,
//! or a test). The state machine only ever returns a [`TurnOutcome`]; applying
//! slot mutations and running follow-up steps is the caller's job.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Slot name for the raw measurement text
pub const SLOT_MEASUREMENTS_TEXT: &str = "measurements_text";

/// Slot name for the instrument error
pub const SLOT_INSTRUMENT_ERROR: &str = "instrument_error";

/// A named processing step the dialogue layer can invoke
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    StoreMeasurements,
    StoreInstrumentError,
    Calculate,
    Reset,
}

impl Step {
    pub fn as_str(&self) -> &str {
        match self {
            Step::StoreMeasurements => "store_measurements",
            Step::StoreInstrumentError => "store_instrument_error",
            Step::Calculate => "calculate",
            Step::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a conversation currently stands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    AwaitingMeasurements,
    AwaitingInstrumentError,
    ReadyToCalculate,
    Reported,
}

impl Phase {
    /// Step that consumes the next user message in this phase
    ///
    /// A reported session treats the next message as a fresh measurement set.
    pub fn entry_step(&self) -> Step {
        match self {
            Phase::AwaitingMeasurements | Phase::Reported => Step::StoreMeasurements,
            Phase::AwaitingInstrumentError => Step::StoreInstrumentError,
            Phase::ReadyToCalculate => Step::Calculate,
        }
    }
}

/// State of the `instrument_error` slot
///
/// `Skipped` is an explicit user decision and differs from `NotProvided`.
/// `Provided` keeps the raw value as it was written, so a value coming from an
/// outer layer that is not a number can still be detected at calculation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum InstrumentSlot {
    #[default]
    NotProvided,
    Skipped,
    Provided(serde_json::Value),
}

impl InstrumentSlot {
    /// Store a numeric instrument error (sign discarded)
    pub fn from_number(value: f64) -> Self {
        InstrumentSlot::Provided(serde_json::json!(value.abs()))
    }

    /// Numeric value of the slot, if one was provided
    ///
    /// Numbers and numeric strings are accepted. Anything else, including
    /// non-finite values, is an `InvalidInstrumentError`.
    pub fn numeric(&self) -> Result<Option<f64>, EngineError> {
        let raw = match self {
            InstrumentSlot::NotProvided | InstrumentSlot::Skipped => return Ok(None),
            InstrumentSlot::Provided(raw) => raw,
        };

        let value = match raw {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match value {
            Some(v) if v.is_finite() => Ok(Some(v.abs())),
            _ => Err(EngineError::InvalidInstrumentError(raw.to_string())),
        }
    }
}

/// Session-scoped slot values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Slots {
    pub measurements_text: Option<String>,
    #[serde(default)]
    pub instrument_error: InstrumentSlot,
}

impl Slots {
    /// Apply a single mutation
    pub fn apply(&mut self, mutation: &SlotMutation) {
        match mutation {
            SlotMutation::MeasurementsText(text) => self.measurements_text = text.clone(),
            SlotMutation::InstrumentError(slot) => self.instrument_error = slot.clone(),
        }
    }
}

/// A slot write requested by a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "slot", content = "value", rename_all = "snake_case")]
pub enum SlotMutation {
    MeasurementsText(Option<String>),
    InstrumentError(InstrumentSlot),
}

impl SlotMutation {
    /// Name of the slot this mutation writes
    pub fn slot_name(&self) -> &str {
        match self {
            SlotMutation::MeasurementsText(_) => SLOT_MEASUREMENTS_TEXT,
            SlotMutation::InstrumentError(_) => SLOT_INSTRUMENT_ERROR,
        }
    }
}

/// Everything a single step produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnOutcome {
    /// Outbound messages, in order
    pub messages: Vec<String>,
    /// Slot writes to apply, in order
    pub mutations: Vec<SlotMutation>,
    /// Phase the session is in after this step
    pub phase: Phase,
    /// Step to run immediately, without waiting for user input
    pub follow_up: Option<Step>,
}

impl TurnOutcome {
    /// Create an empty outcome landing in `phase`
    pub fn new(phase: Phase) -> Self {
        Self {
            messages: Vec::new(),
            mutations: Vec::new(),
            phase,
            follow_up: None,
        }
    }

    /// Add an outbound message
    pub fn say(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    /// Add a slot mutation
    pub fn set(mut self, mutation: SlotMutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Request an immediate follow-up step
    pub fn then(mut self, step: Step) -> Self {
        self.follow_up = Some(step);
        self
    }
}
