//! In-process board contract used by tests and the offline demo.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use shared::domain::{BoardState, TxHandle};
use tokio::sync::Semaphore;

use crate::BoardGateway;

/// Simulated board contract.
///
/// A write is recorded as pending when accepted and applied (message,
/// author, count + 1) when its confirmation is awaited. Failures can be
/// injected for reads, wallet rejection and on-chain revert.
#[derive(Default)]
pub struct InMemoryGateway {
    inner: Mutex<MemoryBoard>,
}

#[derive(Default)]
struct MemoryBoard {
    board: BoardState,
    signer: Option<Address>,
    connected: Option<Address>,
    pending: HashMap<TxHandle, (String, Address)>,
    next_tx: u64,
    failing_reads: u32,
    reject_next_write: Option<String>,
    revert_next_write: Option<String>,
    write_gate: Option<Arc<Semaphore>>,
    confirmation_gate: Option<Arc<Semaphore>>,
    calls: u64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(self, board: BoardState) -> Self {
        self.lock().board = board;
        self
    }

    /// Address that `connect` will hand out.
    pub fn with_signer(self, signer: Address) -> Self {
        self.lock().signer = Some(signer);
        self
    }

    /// Starts with `address` already connected.
    pub fn connected_as(self, address: Address) -> Self {
        {
            let mut inner = self.lock();
            inner.signer = Some(address);
            inner.connected = Some(address);
        }
        self
    }

    /// Overwrites the contract state as if another client had written it.
    pub fn set_board(&self, board: BoardState) {
        self.lock().board = board;
    }

    pub fn board(&self) -> BoardState {
        self.lock().board.clone()
    }

    pub fn disconnect(&self) {
        self.lock().connected = None;
    }

    /// The next `passes` message reads fail, failing their whole pass.
    pub fn fail_message_reads(&self, passes: u32) {
        self.lock().failing_reads = passes;
    }

    pub fn reject_next_write(&self, reason: impl Into<String>) {
        self.lock().reject_next_write = Some(reason.into());
    }

    pub fn revert_next_write(&self, reason: impl Into<String>) {
        self.lock().revert_next_write = Some(reason.into());
    }

    /// Holds every write before it reaches the wallet until a permit is
    /// added to the returned semaphore.
    pub fn hold_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().write_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Holds every confirmation until a permit is added to the returned
    /// semaphore.
    pub fn hold_confirmations(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().confirmation_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Number of gateway calls of any kind served so far.
    pub fn call_count(&self) -> u64 {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBoard> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn counted(&self) -> MutexGuard<'_, MemoryBoard> {
        let mut inner = self.lock();
        inner.calls += 1;
        inner
    }
}

#[async_trait]
impl BoardGateway for InMemoryGateway {
    async fn read_message(&self) -> Result<Option<String>> {
        let mut inner = self.counted();
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            bail!("rpc unavailable");
        }
        Ok(Some(inner.board.message.clone()))
    }

    async fn read_author(&self) -> Result<Option<Address>> {
        Ok(Some(self.counted().board.author))
    }

    async fn read_message_count(&self) -> Result<Option<U256>> {
        Ok(Some(self.counted().board.message_count))
    }

    async fn write_message(&self, message: &str) -> Result<TxHandle> {
        let gate = self.counted().write_gate.clone();
        if let Some(gate) = gate {
            gate.acquire().await?.forget();
        }

        let mut inner = self.lock();
        let Some(sender) = inner.connected else {
            bail!("no wallet connected");
        };
        if let Some(reason) = inner.reject_next_write.take() {
            bail!(reason);
        }
        inner.next_tx += 1;
        let tx = TxHandle(format!("0x{:064x}", inner.next_tx));
        inner
            .pending
            .insert(tx.clone(), (message.to_string(), sender));
        Ok(tx)
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<()> {
        let gate = self.counted().confirmation_gate.clone();
        if let Some(gate) = gate {
            gate.acquire().await?.forget();
        }

        let mut inner = self.lock();
        let (message, sender) = inner
            .pending
            .remove(tx)
            .ok_or_else(|| anyhow!("unknown transaction {tx}"))?;
        if let Some(reason) = inner.revert_next_write.take() {
            bail!("transaction {tx} reverted: {reason}");
        }
        inner.board.message = message;
        inner.board.author = sender;
        inner.board.message_count += U256::from(1);
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.counted().connected.is_some())
    }

    async fn connected_address(&self) -> Result<Option<Address>> {
        Ok(self.counted().connected)
    }

    async fn connect(&self) -> Result<Address> {
        let mut inner = self.counted();
        let signer = inner
            .signer
            .ok_or_else(|| anyhow!("no signer available to connect"))?;
        inner.connected = Some(signer);
        Ok(signer)
    }
}
