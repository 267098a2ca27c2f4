//! Measurement collection state machine
//!
//! Each step reads the caller-supplied [`SessionContext`] and returns a
//! [`TurnOutcome`]. The machine itself holds only immutable collaborators, so
//! one instance serves every session concurrently.

use std::sync::Arc;

use sdk::types::{InstrumentSlot, Phase, SlotMutation, Step, TurnOutcome};
use tracing::{debug, error, info, warn};

use super::lexicon::Lexicon;
use super::messages::Messages;
use super::report;
use super::SessionContext;
use crate::db::RunStore;
use crate::extractor::NumericExtractor;
use crate::stats::ErrorBudget;

/// Drives one session through measurement intake, instrument-error intake,
/// calculation and report
pub struct MeasurementMachine {
    extractor: NumericExtractor,
    lexicon: Lexicon,
    messages: Messages,
    significant_digits: usize,
    store: Arc<dyn RunStore>,
}

impl MeasurementMachine {
    pub fn new(
        extractor: NumericExtractor,
        lexicon: Lexicon,
        messages: Messages,
        significant_digits: usize,
        store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            extractor,
            lexicon,
            messages,
            significant_digits,
            store,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Run a named step against the session
    pub async fn run_step(&self, step: Step, ctx: &SessionContext, text: &str) -> TurnOutcome {
        debug!(sender = %ctx.sender_id, step = %step, phase = ?ctx.phase, "Running step");

        match step {
            Step::StoreMeasurements => self.store_measurements(text),
            Step::StoreInstrumentError => self.store_instrument_error(text),
            Step::Calculate => self.calculate(ctx).await,
            Step::Reset => self.reset(),
        }
    }

    /// Accept a measurement message
    ///
    /// If the text contains an instrument marker, everything from the earliest
    /// marker on is the instrument segment; its first number becomes the
    /// instrument error and the calculation runs in the same turn.
    pub fn store_measurements(&self, text: &str) -> TurnOutcome {
        let text = text.trim();

        let (measurement_part, instrument_part) = match self.lexicon.find_instrument_marker(text)
        {
            Some(idx) => text.split_at(idx),
            None => (text, ""),
        };

        let values = self.extractor.extract(measurement_part);
        if values.is_empty() {
            return TurnOutcome::new(Phase::AwaitingMeasurements)
                .say(self.messages.no_measurements_found());
        }

        info!("Accepted {} measurements", values.len());

        let outcome = TurnOutcome::new(Phase::AwaitingInstrumentError)
            .set(SlotMutation::MeasurementsText(Some(
                measurement_part.trim().to_string(),
            )))
            .say(self.messages.measurements_accepted(&values));

        match self.extractor.first(instrument_part) {
            Some(instr) => {
                let instr = instr.abs();
                let mut outcome = outcome
                    .set(SlotMutation::InstrumentError(InstrumentSlot::from_number(
                        instr,
                    )))
                    .say(self.messages.instrument_accepted(&self.fmt(instr)))
                    .then(Step::Calculate);
                outcome.phase = Phase::ReadyToCalculate;
                outcome
            }
            None => outcome.say(self.messages.instrument_prompt()),
        }
    }

    /// Accept an instrument-error message, or a request to skip it
    pub fn store_instrument_error(&self, text: &str) -> TurnOutcome {
        if self.lexicon.is_skip(text) {
            return TurnOutcome::new(Phase::ReadyToCalculate)
                .set(SlotMutation::InstrumentError(InstrumentSlot::Skipped))
                .say(self.messages.instrument_skipped())
                .then(Step::Calculate);
        }

        match self.extractor.first(text) {
            Some(instr) => {
                let instr = instr.abs();
                TurnOutcome::new(Phase::ReadyToCalculate)
                    .set(SlotMutation::InstrumentError(InstrumentSlot::from_number(
                        instr,
                    )))
                    .say(self.messages.instrument_accepted(&self.fmt(instr)))
                    .say(self.messages.calculating())
                    .then(Step::Calculate)
            }
            None => TurnOutcome::new(Phase::AwaitingInstrumentError)
                .say(self.messages.instrument_not_found()),
        }
    }

    /// Compute, report and persist the run held in the session slots
    ///
    /// A storage failure only adds a warning line; the report is always
    /// delivered.
    pub async fn calculate(&self, ctx: &SessionContext) -> TurnOutcome {
        let measurements_text = ctx.slots.measurements_text.as_deref().unwrap_or_default();
        let values = self.extractor.extract(measurements_text);

        if values.is_empty() {
            return TurnOutcome::new(Phase::AwaitingMeasurements)
                .say(self.messages.no_measurement_data());
        }

        let instrument_error = match ctx.slots.instrument_error.numeric() {
            Ok(instr) => instr,
            Err(e) => {
                warn!(sender = %ctx.sender_id, "Ignoring instrument error: {}", e);
                None
            }
        };

        let budget = match ErrorBudget::compute(&values, instrument_error) {
            Ok(budget) => budget,
            Err(e) => {
                // Unreachable with a non-empty value set
                warn!("Calculation rejected: {}", e);
                return TurnOutcome::new(Phase::AwaitingMeasurements)
                    .say(self.messages.no_measurement_data());
            }
        };

        let mut lines = report::render(&budget, self.messages.labels(), self.significant_digits);

        match self
            .store
            .persist_run(&ctx.sender_id, measurements_text, &values, &budget)
            .await
        {
            Ok(run_id) => {
                info!(sender = %ctx.sender_id, run_id, n = budget.summary.n, "Run saved");
            }
            Err(e) => {
                error!(sender = %ctx.sender_id, "Failed to save run: {:#}", e);
                lines.push(self.messages.storage_warning(&format!("{:#}", e)));
            }
        }

        TurnOutcome::new(Phase::Reported).say(lines.join("\n"))
    }

    /// Clear both slots and start over
    pub fn reset(&self) -> TurnOutcome {
        TurnOutcome::new(Phase::AwaitingMeasurements)
            .set(SlotMutation::MeasurementsText(None))
            .set(SlotMutation::InstrumentError(InstrumentSlot::NotProvided))
            .say(self.messages.reset_done())
    }

    fn fmt(&self, value: f64) -> String {
        report::format_general(value, self.significant_digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MeasurementRow, ResultRecord, RunRecord};
    use crate::dialogue::Language;
    use anyhow::Result;
    use async_trait::async_trait;
    use sdk::types::Slots;
    use std::sync::Mutex;

    /// In-memory store that records calls, optionally failing
    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        runs: Mutex<Vec<(String, String, Option<f64>)>>,
        results: Mutex<Vec<ResultRecord>>,
    }

    #[async_trait]
    impl RunStore for RecordingStore {
        async fn create_run(
            &self,
            sender_id: &str,
            measurements_text: &str,
            instrument_error: Option<f64>,
        ) -> Result<i64> {
            if self.fail {
                return Err(anyhow::anyhow!("database is locked").context("Failed to create run"));
            }
            let mut runs = self.runs.lock().unwrap();
            runs.push((
                sender_id.to_string(),
                measurements_text.to_string(),
                instrument_error,
            ));
            Ok(runs.len() as i64)
        }

        async fn insert_measurements(&self, _run_id: i64, _values: &[f64]) -> Result<()> {
            Ok(())
        }

        async fn save_results(&self, run_id: i64, budget: &ErrorBudget) -> Result<()> {
            self.results
                .lock()
                .unwrap()
                .push(ResultRecord::from_budget(run_id, budget, String::new()));
            Ok(())
        }

        async fn get_run(&self, _run_id: i64) -> Result<Option<RunRecord>> {
            Ok(None)
        }

        async fn get_measurements(&self, _run_id: i64) -> Result<Vec<MeasurementRow>> {
            Ok(Vec::new())
        }

        async fn get_results(&self, _run_id: i64) -> Result<Option<ResultRecord>> {
            Ok(None)
        }

        async fn recent_runs(&self, _limit: i64) -> Result<Vec<RunRecord>> {
            Ok(Vec::new())
        }
    }

    fn machine_with(store: Arc<RecordingStore>) -> MeasurementMachine {
        MeasurementMachine::new(
            NumericExtractor::new().unwrap(),
            Lexicon::default(),
            Messages::new(Language::English),
            6,
            store,
        )
    }

    fn ctx(measurements: Option<&str>, instrument: InstrumentSlot) -> SessionContext {
        SessionContext {
            sender_id: "tester".to_string(),
            phase: Phase::ReadyToCalculate,
            slots: Slots {
                measurements_text: measurements.map(String::from),
                instrument_error: instrument,
            },
        }
    }

    #[test]
    fn test_store_measurements_without_marker() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_measurements("10.1 10.2 10.0 10.3");

        assert_eq!(outcome.phase, Phase::AwaitingInstrumentError);
        assert_eq!(outcome.follow_up, None);
        assert_eq!(
            outcome.mutations,
            vec![SlotMutation::MeasurementsText(Some(
                "10.1 10.2 10.0 10.3".to_string()
            ))]
        );
        assert_eq!(outcome.messages.len(), 2);
        assert!(outcome.messages[0].contains("4 measurements"));
    }

    #[test]
    fn test_store_measurements_with_instrument_shortcut() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_measurements("10.1 10.2 10.0 10.3 instrument error -0.01");

        assert_eq!(outcome.phase, Phase::ReadyToCalculate);
        assert_eq!(outcome.follow_up, Some(Step::Calculate));
        assert_eq!(
            outcome.mutations[0],
            SlotMutation::MeasurementsText(Some("10.1 10.2 10.0 10.3".to_string()))
        );
        assert_eq!(
            outcome.mutations[1],
            SlotMutation::InstrumentError(InstrumentSlot::from_number(0.01))
        );
        assert!(outcome.messages[1].ends_with("= 0.01"));
    }

    #[test]
    fn test_marker_without_number_prompts() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_measurements("5 6 7 device unknown");

        assert_eq!(outcome.phase, Phase::AwaitingInstrumentError);
        assert_eq!(outcome.mutations.len(), 1);
        assert_eq!(
            outcome.mutations[0],
            SlotMutation::MeasurementsText(Some("5 6 7".to_string()))
        );
    }

    #[test]
    fn test_only_first_instrument_number_is_used() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_measurements("1 2 scale 0.5 then 0.7");
        assert_eq!(
            outcome.mutations[1],
            SlotMutation::InstrumentError(InstrumentSlot::from_number(0.5))
        );
    }

    #[test]
    fn test_numbers_only_after_marker_are_rejected() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_measurements("instrument 0.01");

        assert_eq!(outcome.phase, Phase::AwaitingMeasurements);
        assert!(outcome.mutations.is_empty());
        assert_eq!(outcome.messages.len(), 1);
    }

    #[test]
    fn test_store_instrument_error_skip() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_instrument_error("Skip");

        assert_eq!(outcome.phase, Phase::ReadyToCalculate);
        assert_eq!(outcome.follow_up, Some(Step::Calculate));
        assert_eq!(
            outcome.mutations,
            vec![SlotMutation::InstrumentError(InstrumentSlot::Skipped)]
        );
    }

    #[test]
    fn test_store_instrument_error_value() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_instrument_error("-0.02 or maybe 0.03");

        assert_eq!(
            outcome.mutations,
            vec![SlotMutation::InstrumentError(InstrumentSlot::from_number(
                0.02
            ))]
        );
        assert_eq!(outcome.follow_up, Some(Step::Calculate));
    }

    #[test]
    fn test_store_instrument_error_reprompts() {
        let machine = machine_with(Arc::default());
        let outcome = machine.store_instrument_error("not sure yet");

        assert_eq!(outcome.phase, Phase::AwaitingInstrumentError);
        assert!(outcome.mutations.is_empty());
        assert_eq!(outcome.follow_up, None);
    }

    #[tokio::test]
    async fn test_calculate_without_data_reverts() {
        let store = Arc::new(RecordingStore::default());
        let machine = machine_with(Arc::clone(&store));
        let outcome = machine
            .calculate(&ctx(None, InstrumentSlot::NotProvided))
            .await;

        assert_eq!(outcome.phase, Phase::AwaitingMeasurements);
        assert!(store.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_calculate_persists_run() {
        let store = Arc::new(RecordingStore::default());
        let machine = machine_with(Arc::clone(&store));
        let outcome = machine
            .calculate(&ctx(
                Some("10.1 10.2 10.0 10.3"),
                InstrumentSlot::from_number(0.01),
            ))
            .await;

        assert_eq!(outcome.phase, Phase::Reported);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.messages[0].contains("- n = 4"));

        let runs = store.runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].2, Some(0.01));

        let results = store.results.lock().unwrap();
        assert_eq!(results[0].n, 4);
        assert!(results[0].used_instr);
    }

    #[tokio::test]
    async fn test_calculate_invalid_instrument_value_is_ignored() {
        let store = Arc::new(RecordingStore::default());
        let machine = machine_with(Arc::clone(&store));
        let outcome = machine
            .calculate(&ctx(
                Some("1 2 3"),
                InstrumentSlot::Provided(serde_json::json!("a little")),
            ))
            .await;

        assert_eq!(outcome.phase, Phase::Reported);
        assert!(outcome.messages[0].contains("(instrument error not included)"));
        assert_eq!(store.runs.lock().unwrap()[0].2, None);
        assert!(!store.results.lock().unwrap()[0].used_instr);
    }

    #[tokio::test]
    async fn test_storage_failure_still_reports() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let machine = machine_with(Arc::clone(&store));
        let outcome = machine
            .calculate(&ctx(Some("1 2 3"), InstrumentSlot::Skipped))
            .await;

        assert_eq!(outcome.phase, Phase::Reported);
        let report = &outcome.messages[0];
        assert!(report.contains("✅ **Answer:** x = 2 ± 0.57735"));
        assert!(report.ends_with(
            "⚠️ The run could not be saved: Failed to create run: database is locked"
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_budget_is_not_persisted() {
        let store = Arc::new(RecordingStore::default());
        let machine = machine_with(Arc::clone(&store));
        let outcome = machine
            .calculate(&ctx(Some("1.7e308 -1.7e308"), InstrumentSlot::Skipped))
            .await;

        assert_eq!(outcome.phase, Phase::Reported);
        assert!(outcome.messages[0]
            .ends_with("⚠️ The run could not be saved: calculated values are out of range and cannot be stored"));
        assert!(store.runs.lock().unwrap().is_empty());
        assert!(store.results.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reset_clears_slots() {
        let machine = machine_with(Arc::default());
        let outcome = machine.reset();

        assert_eq!(outcome.phase, Phase::AwaitingMeasurements);
        assert_eq!(
            outcome.mutations,
            vec![
                SlotMutation::MeasurementsText(None),
                SlotMutation::InstrumentError(InstrumentSlot::NotProvided),
            ]
        );
    }
}
