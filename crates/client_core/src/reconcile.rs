use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use chrono::Utc;
use shared::{domain::BoardState, error::BoardError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{store::ViewStateStore, BoardEvent, BoardGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The batch was merged and differed from the previous state.
    Replaced,
    /// The batch was merged but matched the previous state.
    Unchanged,
    /// A newer batch was already merged; this one was dropped.
    Stale,
    /// The view was torn down before or during the pass.
    Discarded,
}

/// Runs reconciliation passes: three concurrent reads, joined, merged once.
pub struct Reconciler {
    gateway: Arc<dyn BoardGateway>,
    store: ViewStateStore,
    events: broadcast::Sender<BoardEvent>,
    next_pass: AtomicU64,
    applied_pass: Mutex<u64>,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn BoardGateway>,
        store: ViewStateStore,
        events: broadcast::Sender<BoardEvent>,
    ) -> Self {
        Self {
            gateway,
            store,
            events,
            next_pass: AtomicU64::new(0),
            applied_pass: Mutex::new(0),
        }
    }

    pub fn store(&self) -> &ViewStateStore {
        &self.store
    }

    /// One reconciliation pass. Read failures are logged and reported as
    /// `GatewayRead`; the store keeps its last-known state.
    pub async fn run_pass(&self) -> Result<PassOutcome, BoardError> {
        if self.store.is_closed() {
            return Ok(PassOutcome::Discarded);
        }
        let pass = self.next_pass.fetch_add(1, Ordering::AcqRel) + 1;

        let reads = futures::try_join!(
            self.gateway.read_message(),
            self.gateway.read_author(),
            self.gateway.read_message_count(),
        );
        let (message, author, message_count) = match reads {
            Ok(values) => values,
            Err(err) => {
                let err = format!("{err:#}");
                warn!(pass, error = %err, "board read failed; keeping last-known state");
                let _ = self.events.send(BoardEvent::ReadFailed {
                    pass,
                    error: err.clone(),
                });
                return Err(BoardError::GatewayRead(err));
            }
        };

        let state = BoardState::from_reads(message, author, message_count);
        Ok(self.merge(pass, state))
    }

    fn merge(&self, pass: u64, state: BoardState) -> PassOutcome {
        let mut applied = match self.applied_pass.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.store.is_closed() {
            debug!(pass, "view torn down; discarding read batch");
            return PassOutcome::Discarded;
        }
        if pass < *applied {
            debug!(pass, applied = *applied, "discarding stale read batch");
            return PassOutcome::Stale;
        }
        *applied = pass;

        if self.store.replace(state.clone()) {
            debug!(pass, count = %state.message_count, "board state replaced");
            let _ = self.events.send(BoardEvent::StateReplaced {
                pass,
                state,
                refreshed_at: Utc::now(),
            });
            PassOutcome::Replaced
        } else {
            PassOutcome::Unchanged
        }
    }
}
