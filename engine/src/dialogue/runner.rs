//! Dialogue runner
//!
//! Stands in for the conversational runtime: it keeps a [`SessionContext`] per
//! sender, decides which step consumes an incoming message, applies the slot
//! mutations a step returns and runs any requested follow-up step before the
//! turn ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sdk::errors::EngineError;
use sdk::types::Step;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::machine::MeasurementMachine;
use super::SessionContext;

/// Sessions untouched for this long are dropped by default
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct SessionEntry {
    context: Arc<Mutex<SessionContext>>,
    last_seen: Instant,
}

/// In-memory session contexts keyed by sender id
///
/// Each session has its own lock, so different senders never wait on each
/// other while a turn is being processed.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `sender_id`, creating it if needed
    pub async fn session(&self, sender_id: &str) -> Arc<Mutex<SessionContext>> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| SessionEntry {
                context: Arc::new(Mutex::new(SessionContext::new(sender_id))),
                last_seen: Instant::now(),
            });
        entry.last_seen = Instant::now();
        Arc::clone(&entry.context)
    }

    /// Copy of the current session state
    pub async fn snapshot(&self, sender_id: &str) -> Result<SessionContext, EngineError> {
        let session = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(sender_id)
                .map(|entry| Arc::clone(&entry.context))
                .ok_or_else(|| EngineError::SessionNotFound(sender_id.to_string()))?
        };
        let ctx = session.lock().await;
        Ok(ctx.clone())
    }

    /// Drop sessions idle for at least `max_idle`
    ///
    /// A session whose context is still held by a running turn is kept.
    /// Returns the number of dropped sessions.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_seen.elapsed() < max_idle || Arc::strong_count(&entry.context) > 1
        });
        before - sessions.len()
    }

    /// Number of known sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Routes user messages through the measurement state machine
pub struct DialogueRunner {
    machine: MeasurementMachine,
    sessions: SessionStore,
    max_follow_ups: usize,
    session_idle: Duration,
}

impl DialogueRunner {
    pub fn new(machine: MeasurementMachine, max_follow_ups: usize) -> Self {
        Self {
            machine,
            sessions: SessionStore::new(),
            max_follow_ups,
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }

    /// Set how long an untouched session is kept
    pub fn with_session_idle(mut self, session_idle: Duration) -> Self {
        self.session_idle = session_idle;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn machine(&self) -> &MeasurementMachine {
        &self.machine
    }

    /// Process one user message and return the replies for this turn
    ///
    /// A reset request is honoured in every phase. Otherwise the session's
    /// phase picks the step. Follow-up steps run immediately with empty input.
    pub async fn handle_message(
        &self,
        sender_id: &str,
        text: &str,
    ) -> Result<Vec<String>, EngineError> {
        let session = self.sessions.session(sender_id).await;
        let mut ctx = session.lock().await;

        let step = if self.machine.lexicon().is_reset(text) {
            Step::Reset
        } else {
            ctx.phase.entry_step()
        };

        info!(sender = %sender_id, step = %step, "Processing message");
        self.run_chain(&mut ctx, step, text).await
    }

    /// Run `step` directly, bypassing message routing
    pub async fn invoke(&self, sender_id: &str, step: Step) -> Result<Vec<String>, EngineError> {
        let session = self.sessions.session(sender_id).await;
        let mut ctx = session.lock().await;
        self.run_chain(&mut ctx, step, "").await
    }

    /// Drop sessions idle for longer than the configured limit
    pub async fn evict_idle_sessions(&self) -> usize {
        let evicted = self.sessions.evict_idle(self.session_idle).await;
        if evicted > 0 {
            info!(
                evicted,
                remaining = self.sessions.len().await,
                "Evicted idle sessions"
            );
        }
        evicted
    }

    /// Run `first` and its follow-ups
    ///
    /// If the chain exceeds `max_follow_ups` the session is restored to its
    /// state before the turn, so a failed turn leaves no partial slot writes.
    async fn run_chain(
        &self,
        ctx: &mut SessionContext,
        first: Step,
        text: &str,
    ) -> Result<Vec<String>, EngineError> {
        let before = ctx.clone();
        let mut replies = Vec::new();
        let mut step = first;
        let mut input = text;
        let mut follow_ups = 0;

        loop {
            let outcome = self.machine.run_step(step, ctx, input).await;

            for mutation in &outcome.mutations {
                debug!(slot = mutation.slot_name(), "Applying slot mutation");
                ctx.slots.apply(mutation);
            }
            ctx.phase = outcome.phase;
            replies.extend(outcome.messages);

            match outcome.follow_up {
                Some(next) => {
                    follow_ups += 1;
                    if follow_ups > self.max_follow_ups {
                        warn!(
                            sender = %ctx.sender_id,
                            "Follow-up limit reached, restoring session"
                        );
                        *ctx = before;
                        return Err(EngineError::FollowUpLimitExceeded(self.max_follow_ups));
                    }
                    debug!(step = %next, "Running follow-up step");
                    step = next;
                    input = "";
                }
                None => break,
            }
        }

        Ok(replies)
    }
}
