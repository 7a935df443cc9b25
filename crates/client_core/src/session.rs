use std::{sync::Arc, time::Duration};

use shared::{
    domain::{BoardState, SubmitStatus, WalletStatus},
    error::BoardError,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    controller::{SubmitOutcome, UpdateController},
    reconcile::{PassOutcome, Reconciler},
    store::ViewStateStore,
    BoardEvent, BoardGateway,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A mounted board view: owns the store, the polling task and the update
/// controller for one gateway.
///
/// Created by [`BoardSession::mount`] and torn down by
/// [`BoardSession::unmount`]; dropping a mounted session stops polling too.
pub struct BoardSession {
    gateway: Arc<dyn BoardGateway>,
    store: ViewStateStore,
    reconciler: Arc<Reconciler>,
    controller: UpdateController,
    wallet: watch::Sender<WalletStatus>,
    events: broadcast::Sender<BoardEvent>,
    shutdown: watch::Sender<bool>,
    poll_task: Option<JoinHandle<()>>,
}

impl BoardSession {
    /// Queries the wallet, then starts polling. The first pass runs as soon
    /// as the runtime schedules the polling task.
    pub async fn mount(gateway: Arc<dyn BoardGateway>, options: SessionOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = ViewStateStore::new();
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&gateway),
            store.clone(),
            events.clone(),
        ));
        let controller =
            UpdateController::new(Arc::clone(&gateway), Arc::clone(&reconciler), events.clone());
        let (wallet, _) = watch::channel(WalletStatus::default());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut session = Self {
            gateway,
            store,
            reconciler: Arc::clone(&reconciler),
            controller,
            wallet,
            events,
            shutdown,
            poll_task: None,
        };
        session.refresh_wallet().await;

        info!(
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            "board view mounted"
        );
        session.poll_task = Some(tokio::spawn(run_poll_loop(
            reconciler,
            options.poll_interval,
            shutdown_rx,
        )));
        session
    }

    /// Stops polling and waits for the polling task. Reads still in flight
    /// are dropped, never merged.
    pub async fn unmount(mut self) {
        self.teardown();
        if let Some(task) = self.poll_task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "board polling task ended abnormally");
                }
            }
        }
        info!("board view unmounted");
    }

    fn teardown(&self) {
        self.store.close();
        let _ = self.shutdown.send(true);
    }

    pub fn current(&self) -> BoardState {
        self.store.current()
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    pub fn store(&self) -> &ViewStateStore {
        &self.store
    }

    pub fn status(&self) -> SubmitStatus {
        self.controller.status()
    }

    pub fn wallet(&self) -> WalletStatus {
        *self.wallet.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BoardState> {
        self.store.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SubmitStatus> {
        self.controller.subscribe_status()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub async fn submit(&self, candidate: &str) -> Result<SubmitOutcome, BoardError> {
        self.controller.submit(candidate).await
    }

    /// Runs one reconciliation pass outside the polling schedule.
    pub async fn refresh(&self) -> Result<PassOutcome, BoardError> {
        self.reconciler.run_pass().await
    }

    pub async fn connect_wallet(&self) -> Result<WalletStatus, BoardError> {
        if self.store.is_closed() {
            return Err(BoardError::ViewClosed);
        }
        let address = self.gateway.connect().await.map_err(|err| {
            warn!(error = %err, "wallet connection failed");
            BoardError::WalletConnect(format!("{err:#}"))
        })?;
        info!(%address, "wallet connected");
        let status = WalletStatus::connected(address);
        self.publish_wallet(status);
        Ok(status)
    }

    /// Re-reads the wallet connection from the gateway. Failures leave the
    /// previous status in place.
    pub async fn refresh_wallet(&self) -> WalletStatus {
        let connected = match self.gateway.is_connected().await {
            Ok(connected) => connected,
            Err(err) => {
                warn!(error = %err, "wallet connection check failed");
                return self.wallet();
            }
        };
        let address = if connected {
            match self.gateway.connected_address().await {
                Ok(address) => address,
                Err(err) => {
                    warn!(error = %err, "connected address lookup failed");
                    None
                }
            }
        } else {
            None
        };
        let status = WalletStatus { connected, address };
        self.publish_wallet(status);
        status
    }

    fn publish_wallet(&self, status: WalletStatus) {
        let changed = self.wallet.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            let _ = self.events.send(BoardEvent::WalletChanged(status));
        }
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            self.teardown();
            task.abort();
        }
    }
}

async fn run_poll_loop(
    reconciler: Arc<Reconciler>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = reconciler.run_pass() => {}
        }
    }
    debug!("board polling stopped");
}
