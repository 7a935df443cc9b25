use std::sync::Arc;

use shared::{
    domain::{SubmitStatus, TxHandle},
    error::BoardError,
};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::{
    reconcile::{PassOutcome, Reconciler},
    BoardEvent, BoardGateway,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub tx: TxHandle,
    /// Result of the reconciliation pass run after confirmation, `None` if
    /// that pass failed to read.
    pub refresh: Option<PassOutcome>,
}

/// Single-flight writer for the board message.
pub struct UpdateController {
    gateway: Arc<dyn BoardGateway>,
    reconciler: Arc<Reconciler>,
    status: watch::Sender<SubmitStatus>,
    events: broadcast::Sender<BoardEvent>,
}

impl UpdateController {
    pub fn new(
        gateway: Arc<dyn BoardGateway>,
        reconciler: Arc<Reconciler>,
        events: broadcast::Sender<BoardEvent>,
    ) -> Self {
        let (status, _) = watch::channel(SubmitStatus::Idle);
        Self {
            gateway,
            reconciler,
            status,
            events,
        }
    }

    pub fn status(&self) -> SubmitStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SubmitStatus> {
        self.status.subscribe()
    }

    /// Writes `candidate` to the board and waits for it to be finalized.
    ///
    /// The text is sent as typed; only the emptiness check trims it.
    pub async fn submit(&self, candidate: &str) -> Result<SubmitOutcome, BoardError> {
        if self.reconciler.store().is_closed() {
            return Err(BoardError::ViewClosed);
        }
        if matches!(*self.status.borrow(), SubmitStatus::Error(_)) {
            self.transition(SubmitStatus::Idle);
        }
        if candidate.trim().is_empty() {
            return Err(BoardError::empty_message());
        }
        if self.status.borrow().is_in_flight() {
            return Err(BoardError::AlreadyInProgress);
        }

        match self.gateway.is_connected().await {
            Ok(true) => {}
            Ok(false) => return Err(BoardError::NotConnected),
            Err(err) => {
                warn!(error = %err, "wallet connection check failed");
                return Err(BoardError::NotConnected);
            }
        }

        if !self.claim() {
            return Err(BoardError::AlreadyInProgress);
        }

        let tx = match self.gateway.write_message(candidate).await {
            Ok(tx) => tx,
            Err(err) => return Err(self.fail(err)),
        };
        info!(tx = %tx, "board update accepted; awaiting confirmation");
        self.transition(SubmitStatus::Confirming);
        let _ = self.events.send(BoardEvent::WriteAccepted { tx: tx.clone() });

        if let Err(err) = self.gateway.await_confirmation(&tx).await {
            return Err(self.fail(err));
        }
        info!(tx = %tx, "board update confirmed");
        self.transition(SubmitStatus::Idle);
        let _ = self.events.send(BoardEvent::WriteConfirmed { tx: tx.clone() });

        let refresh = self.reconciler.run_pass().await.ok();
        Ok(SubmitOutcome { tx, refresh })
    }

    /// Atomically moves `Idle -> Submitting`.
    fn claim(&self) -> bool {
        let claimed = self.status.send_if_modified(|status| {
            if *status == SubmitStatus::Idle {
                *status = SubmitStatus::Submitting;
                true
            } else {
                false
            }
        });
        if claimed {
            let _ = self
                .events
                .send(BoardEvent::StatusChanged(SubmitStatus::Submitting));
        }
        claimed
    }

    fn transition(&self, next: SubmitStatus) -> bool {
        let applied = self.status.send_if_modified(|status| {
            if status.can_transition_to(&next) {
                *status = next.clone();
                true
            } else {
                error!(
                    from = status.label(),
                    to = next.label(),
                    "rejected illegal submit status transition"
                );
                false
            }
        });
        if applied {
            let _ = self.events.send(BoardEvent::StatusChanged(next));
        }
        applied
    }

    fn fail(&self, err: anyhow::Error) -> BoardError {
        let reason = format!("{err:#}");
        warn!(error = %reason, "board update failed");
        self.transition(SubmitStatus::Error(reason.clone()));
        BoardError::GatewayWrite(reason)
    }
}
