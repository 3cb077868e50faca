//! A conversation bound to an orchestration loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use turnwise_core::conversation::{ConversationState, Turn};
use turnwise_core::error::{Error, Result};
use turnwise_core::stream::{AggregationResult, StreamObserver};

use crate::loop_runner::{OrchestrationLoop, RunOutcome};

/// One conversation: its state plus the loop that advances it.
///
/// At most one turn runs at a time. A second `run` while one is in flight
/// fails with [`Error::ConcurrentTurn`] instead of queueing.
pub struct Session {
    engine: Arc<OrchestrationLoop>,
    state: Mutex<ConversationState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag on every exit path.
struct TurnGuard<'a>(&'a AtomicBool);

impl<'a> TurnGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ConcurrentTurn)?;
        Ok(Self(flag))
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Session {
    pub fn new(engine: Arc<OrchestrationLoop>) -> Self {
        Self::with_state(engine, ConversationState::new())
    }

    /// Resume an existing conversation.
    pub fn with_state(engine: Arc<OrchestrationLoop>, state: ConversationState) -> Self {
        Self {
            engine,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one user turn to completion.
    pub async fn run(
        &self,
        utterance: &str,
        observer: &dyn StreamObserver,
    ) -> Result<AggregationResult> {
        self.run_with_cancel(utterance, observer, &CancellationToken::new())
            .await
    }

    /// Run one user turn, abandoning it when `cancel` fires.
    ///
    /// A service or stream failure is not an `Err`: it comes back as a result
    /// with `failed` set and is recorded without moving the chain. Typed
    /// faults (transport, protocol, tool loop, fatal tool) are recorded the
    /// same way and then returned. A cancelled turn records nothing.
    pub async fn run_with_cancel(
        &self,
        utterance: &str,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult> {
        let _guard = TurnGuard::acquire(&self.in_flight)?;
        let previous = self.lock_state().current_turn_reference().map(str::to_string);

        match self.engine.drive(utterance, previous, observer, cancel).await {
            RunOutcome::Finished(result) => {
                self.lock_state().record_turn(utterance, &result);
                Ok(result)
            }
            RunOutcome::Aborted { partial, error } => {
                warn!(error = %error, "Turn aborted");
                self.lock_state().record_turn(utterance, &partial);
                Err(error)
            }
            RunOutcome::Cancelled => {
                info!("Turn cancelled");
                Err(Error::Cancelled)
            }
        }
    }

    /// A snapshot of the conversation.
    pub fn state(&self) -> ConversationState {
        self.lock_state().clone()
    }

    pub fn current_turn_reference(&self) -> Option<String> {
        self.lock_state().current_turn_reference().map(str::to_string)
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.lock_state().transcript().to_vec()
    }

    /// Start over with an unlinked conversation.
    pub fn reset(&self) -> Result<()> {
        let _guard = TurnGuard::acquire(&self.in_flight)?;
        self.lock_state().reset();
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, ConversationState> {
        // Every mutation is a single call, so a poisoned state is still whole.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
