use super::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy_primitives::address;
use shared::error::BoardError;
use tokio::sync::{broadcast, Semaphore};

const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
const ABC: Address = address!("abc0000000000000000000000000000000000001");

fn hello_board() -> BoardState {
    BoardState::new("hello", ABC, U256::from(1))
}

fn fast_options() -> SessionOptions {
    SessionOptions {
        poll_interval: Duration::from_secs(2),
    }
}

/// Gateway whose reads return whatever `board` holds when the read starts.
/// The first `held_reads` reads park on `gate` after taking their snapshot.
struct GatedGateway {
    board: Mutex<BoardState>,
    gate: Arc<Semaphore>,
    held_reads: AtomicUsize,
    parked: AtomicUsize,
}

impl GatedGateway {
    fn new(board: BoardState) -> Self {
        Self {
            board: Mutex::new(board),
            gate: Arc::new(Semaphore::new(0)),
            held_reads: AtomicUsize::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    fn set_board(&self, board: BoardState) {
        *self.board.lock().expect("board lock") = board;
    }

    async fn snapshot(&self) -> BoardState {
        let board = self.board.lock().expect("board lock").clone();
        let hold = self
            .held_reads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if hold {
            self.parked.fetch_add(1, Ordering::AcqRel);
            self.gate.acquire().await.expect("gate").forget();
        }
        board
    }
}

#[async_trait]
impl BoardGateway for GatedGateway {
    async fn read_message(&self) -> Result<Option<String>> {
        Ok(Some(self.snapshot().await.message))
    }

    async fn read_author(&self) -> Result<Option<Address>> {
        Ok(Some(self.snapshot().await.author))
    }

    async fn read_message_count(&self) -> Result<Option<U256>> {
        Ok(Some(self.snapshot().await.message_count))
    }

    async fn write_message(&self, _message: &str) -> Result<TxHandle> {
        Err(anyhow!("read-only test gateway"))
    }

    async fn await_confirmation(&self, _tx: &TxHandle) -> Result<()> {
        Err(anyhow!("read-only test gateway"))
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(false)
    }

    async fn connected_address(&self) -> Result<Option<Address>> {
        Ok(None)
    }

    async fn connect(&self) -> Result<Address> {
        Err(anyhow!("read-only test gateway"))
    }
}

/// Gateway that resolves reads without content.
struct EmptyReadsGateway;

#[async_trait]
impl BoardGateway for EmptyReadsGateway {
    async fn read_message(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn read_author(&self) -> Result<Option<Address>> {
        Ok(None)
    }

    async fn read_message_count(&self) -> Result<Option<U256>> {
        Ok(None)
    }

    async fn write_message(&self, _message: &str) -> Result<TxHandle> {
        Err(anyhow!("unused"))
    }

    async fn await_confirmation(&self, _tx: &TxHandle) -> Result<()> {
        Err(anyhow!("unused"))
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(false)
    }

    async fn connected_address(&self) -> Result<Option<Address>> {
        Ok(None)
    }

    async fn connect(&self) -> Result<Address> {
        Err(anyhow!("unused"))
    }
}

fn reconciler_for(gateway: Arc<dyn BoardGateway>) -> (Arc<Reconciler>, ViewStateStore) {
    let (events, _) = broadcast::channel(64);
    let store = ViewStateStore::new();
    (
        Arc::new(Reconciler::new(gateway, store.clone(), events)),
        store,
    )
}

fn status_changes(rx: &mut broadcast::Receiver<BoardEvent>) -> Vec<SubmitStatus> {
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BoardEvent::StatusChanged(status) = event {
            statuses.push(status);
        }
    }
    statuses
}

async fn wait_for_state(session: &BoardSession, predicate: impl Fn(&BoardState) -> bool) {
    let mut rx = session.subscribe_state();
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|state| predicate(state)))
        .await
        .expect("board state timeout")
        .expect("store dropped");
}

#[test]
fn store_replace_is_idempotent_for_observers() {
    let store = ViewStateStore::new();
    let mut rx = store.subscribe();
    assert!(!store.is_loaded());

    assert!(store.replace(hello_board()));
    assert!(rx.has_changed().expect("sender alive"));
    rx.borrow_and_update();

    assert!(!store.replace(hello_board()));
    assert!(!rx.has_changed().expect("sender alive"));
    assert_eq!(store.current(), hello_board());
    assert!(store.is_loaded());
}

#[test]
fn closed_store_refuses_replacement() {
    let store = ViewStateStore::new();
    store.close();
    assert!(!store.replace(hello_board()));
    assert_eq!(store.current(), BoardState::default());
}

#[tokio::test]
async fn pass_merges_whole_batch() {
    let gateway = Arc::new(InMemoryGateway::new().with_board(hello_board()));
    let (reconciler, store) = reconciler_for(gateway);

    assert_eq!(store.current(), BoardState::default());
    assert_eq!(reconciler.run_pass().await, Ok(PassOutcome::Replaced));
    assert_eq!(store.current(), hello_board());
    assert_eq!(reconciler.run_pass().await, Ok(PassOutcome::Unchanged));
}

#[tokio::test]
async fn pass_normalizes_missing_values() {
    let (reconciler, store) = reconciler_for(Arc::new(EmptyReadsGateway));
    store.replace(hello_board());

    assert_eq!(reconciler.run_pass().await, Ok(PassOutcome::Replaced));
    assert_eq!(store.current(), BoardState::default());
}

#[tokio::test]
async fn stale_batch_never_overwrites_newer_state() {
    let old = hello_board();
    let new = BoardState::new("newer", ALICE, U256::from(2));
    let gateway = Arc::new(GatedGateway::new(old));
    gateway.held_reads.store(3, Ordering::Release);
    let (reconciler, store) = reconciler_for(gateway.clone());

    let slow = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.run_pass().await }
    });
    while gateway.parked.load(Ordering::Acquire) < 3 {
        tokio::task::yield_now().await;
    }

    gateway.set_board(new.clone());
    assert_eq!(reconciler.run_pass().await, Ok(PassOutcome::Replaced));
    assert_eq!(store.current(), new);

    gateway.gate.add_permits(3);
    let outcome = slow.await.expect("slow pass task");
    assert_eq!(outcome, Ok(PassOutcome::Stale));
    assert_eq!(store.current(), new);
}

#[tokio::test]
async fn failed_pass_keeps_last_known_state() {
    let gateway = Arc::new(InMemoryGateway::new().with_board(hello_board()));
    let (reconciler, store) = reconciler_for(gateway.clone());
    reconciler.run_pass().await.expect("first pass");

    gateway.set_board(BoardState::new("changed", ALICE, U256::from(2)));
    gateway.fail_message_reads(1);
    let err = reconciler.run_pass().await.expect_err("read failure");
    assert!(matches!(
        err,
        BoardError::GatewayRead(ref reason) if reason.contains("rpc unavailable")
    ));
    assert_eq!(store.current(), hello_board());
}

#[tokio::test(start_paused = true)]
async fn polling_retries_after_consecutive_read_failures() {
    let gateway = Arc::new(InMemoryGateway::new().with_board(hello_board()));
    gateway.fail_message_reads(2);
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    let mut events = session.subscribe_events();

    let mut failures = 0;
    loop {
        match events.recv().await.expect("event") {
            BoardEvent::ReadFailed { .. } => {
                failures += 1;
                assert_eq!(session.current(), BoardState::default());
                assert!(!session.is_loaded());
            }
            BoardEvent::StateReplaced { pass, state, .. } => {
                assert_eq!(failures, 2);
                assert_eq!(pass, 3);
                assert_eq!(state, hello_board());
                break;
            }
            _ => {}
        }
    }
    assert_eq!(session.current(), hello_board());
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn polling_picks_up_external_writes() {
    let gateway = Arc::new(InMemoryGateway::new().with_board(hello_board()));
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    wait_for_state(&session, |state| *state == hello_board()).await;

    let external = BoardState::new("from elsewhere", ALICE, U256::from(2));
    gateway.set_board(external.clone());
    wait_for_state(&session, |state| *state == external).await;
    session.unmount().await;
}

#[tokio::test]
async fn submit_rejects_blank_input_without_gateway_calls() {
    let gateway = Arc::new(InMemoryGateway::new().connected_as(ALICE));
    let (reconciler, _store) = reconciler_for(gateway.clone());
    let (events, _) = broadcast::channel(16);
    let controller = UpdateController::new(gateway.clone(), reconciler, events);

    for candidate in ["", "   ", "\n\t "] {
        let err = controller.submit(candidate).await.expect_err("blank input");
        assert_eq!(err, BoardError::Validation("empty message".into()));
    }
    assert_eq!(gateway.call_count(), 0);
    assert_eq!(controller.status(), SubmitStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn submit_requires_connected_wallet() {
    let gateway = Arc::new(InMemoryGateway::new().with_board(hello_board()));
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    assert!(!session.wallet().connected);

    let err = session.submit("world").await.expect_err("not connected");
    assert_eq!(err, BoardError::NotConnected);
    assert_eq!(session.status(), SubmitStatus::Idle);
    assert_eq!(gateway.board(), hello_board());
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn end_to_end_submit_reconciles_new_message() {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_board(hello_board())
            .connected_as(ALICE),
    );
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    assert_eq!(session.current(), BoardState::default());
    assert_eq!(session.wallet(), WalletStatus::connected(ALICE));

    wait_for_state(&session, |state| *state == hello_board()).await;
    let before = session.current().message_count;

    let mut events = session.subscribe_events();
    let outcome = session.submit("world").await.expect("submit");

    assert_eq!(
        status_changes(&mut events),
        vec![
            SubmitStatus::Submitting,
            SubmitStatus::Confirming,
            SubmitStatus::Idle
        ]
    );
    assert_eq!(outcome.refresh, Some(PassOutcome::Replaced));
    let after = session.current();
    assert_eq!(after.message, "world");
    assert_eq!(after.author, ALICE);
    assert_eq!(after.message_count, U256::from(2));
    assert!(after.message_count > before);
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn submit_sends_text_untrimmed() {
    let gateway = Arc::new(InMemoryGateway::new().connected_as(ALICE));
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;

    session.submit("  spaced out  ").await.expect("submit");
    assert_eq!(gateway.board().message, "  spaced out  ");
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn second_submit_while_confirming_is_rejected() {
    let gateway = Arc::new(InMemoryGateway::new().connected_as(ALICE));
    let gate = gateway.hold_confirmations();
    let session = Arc::new(BoardSession::mount(gateway.clone(), fast_options()).await);

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("first").await }
    });
    let mut status = session.subscribe_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|status| *status == SubmitStatus::Confirming),
    )
    .await
    .expect("confirming timeout")
    .expect("status sender alive");

    let err = session.submit("second").await.expect_err("in flight");
    assert_eq!(err, BoardError::AlreadyInProgress);
    assert_eq!(session.status(), SubmitStatus::Confirming);

    gate.add_permits(1);
    first.await.expect("first task").expect("first submit");
    assert_eq!(session.status(), SubmitStatus::Idle);
    assert_eq!(session.current().message, "first");
    assert_eq!(gateway.board().message_count, U256::from(1));
}

#[tokio::test(start_paused = true)]
async fn second_submit_while_submitting_is_rejected() {
    let gateway = Arc::new(InMemoryGateway::new().connected_as(ALICE));
    let gate = gateway.hold_writes();
    let session = Arc::new(BoardSession::mount(gateway.clone(), fast_options()).await);

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("first").await }
    });
    let mut status = session.subscribe_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|status| *status == SubmitStatus::Submitting),
    )
    .await
    .expect("submitting timeout")
    .expect("status sender alive");

    let err = session.submit("second").await.expect_err("in flight");
    assert_eq!(err, BoardError::AlreadyInProgress);
    assert_eq!(session.status(), SubmitStatus::Submitting);

    gate.add_permits(1);
    let outcome = first.await.expect("first task").expect("first submit");
    assert_eq!(outcome.refresh, Some(PassOutcome::Replaced));
    assert_eq!(session.status(), SubmitStatus::Idle);
    assert_eq!(session.current().message, "first");
    assert_eq!(gateway.board().message, "first");
    assert_eq!(gateway.board().message_count, U256::from(1));
}

#[tokio::test(start_paused = true)]
async fn rejected_write_surfaces_error_then_resets_on_next_submit() {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_board(hello_board())
            .connected_as(ALICE),
    );
    gateway.reject_next_write("user rejected the request");
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    let mut events = session.subscribe_events();

    let err = session.submit("world").await.expect_err("rejected");
    assert_eq!(
        err,
        BoardError::GatewayWrite("user rejected the request".into())
    );
    assert_eq!(
        session.status(),
        SubmitStatus::Error("user rejected the request".into())
    );

    session.submit("again").await.expect("retry succeeds");
    assert_eq!(
        status_changes(&mut events),
        vec![
            SubmitStatus::Submitting,
            SubmitStatus::Error("user rejected the request".into()),
            SubmitStatus::Idle,
            SubmitStatus::Submitting,
            SubmitStatus::Confirming,
            SubmitStatus::Idle,
        ]
    );
    assert_eq!(session.current().message, "again");
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn reverted_write_is_terminal_for_the_submission() {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_board(hello_board())
            .connected_as(ALICE),
    );
    gateway.revert_next_write("execution reverted");
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    wait_for_state(&session, |state| *state == hello_board()).await;

    let err = session.submit("world").await.expect_err("reverted");
    assert!(matches!(err, BoardError::GatewayWrite(ref reason) if reason.contains("reverted")));
    assert!(matches!(session.status(), SubmitStatus::Error(_)));
    assert_eq!(gateway.board(), hello_board());
    assert_eq!(session.current(), hello_board());
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn connect_wallet_updates_status() {
    let gateway = Arc::new(InMemoryGateway::new().with_signer(ALICE));
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    assert_eq!(session.wallet(), WalletStatus::default());

    let status = session.connect_wallet().await.expect("connect");
    assert_eq!(status, WalletStatus::connected(ALICE));
    assert_eq!(session.wallet().header_label(), shared::domain::short_address(&ALICE));

    gateway.disconnect();
    assert!(!session.refresh_wallet().await.connected);
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn stub_gateway_shows_welcome_and_refuses_wallet() {
    let session = BoardSession::mount(Arc::new(StubGateway), fast_options()).await;
    wait_for_state(&session, |state| state.message == STUB_WELCOME_MESSAGE).await;
    assert_eq!(session.current().author, Address::ZERO);

    let err = session.connect_wallet().await.expect_err("stub connect");
    assert!(matches!(
        err,
        BoardError::WalletConnect(ref reason) if reason.contains("not implemented")
    ));
    assert_eq!(
        session.submit("hello").await.expect_err("stub submit"),
        BoardError::NotConnected
    );
    session.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_polling_and_rejects_submits() {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_board(hello_board())
            .connected_as(ALICE),
    );
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    wait_for_state(&session, |state| *state == hello_board()).await;
    let store = session.store().clone();
    let controller_calls = gateway.call_count();

    session.unmount().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.call_count(), controller_calls);
    assert!(store.is_closed());

    gateway.set_board(BoardState::new("late", ALICE, U256::from(9)));
    assert!(!store.replace(gateway.board()));
    assert_eq!(store.current(), hello_board());
}

#[tokio::test(start_paused = true)]
async fn submit_after_teardown_is_view_closed() {
    let gateway = Arc::new(InMemoryGateway::new().connected_as(ALICE));
    let session = BoardSession::mount(gateway.clone(), fast_options()).await;
    let (events, _) = broadcast::channel(16);
    let store = session.store().clone();
    let reconciler = Arc::new(Reconciler::new(gateway.clone(), store.clone(), events.clone()));
    let controller = UpdateController::new(gateway.clone(), Arc::clone(&reconciler), events);

    session.unmount().await;
    let calls = gateway.call_count();
    assert_eq!(
        controller.submit("late").await.expect_err("closed"),
        BoardError::ViewClosed
    );
    assert_eq!(reconciler.run_pass().await, Ok(PassOutcome::Discarded));
    assert_eq!(gateway.call_count(), calls);
}
