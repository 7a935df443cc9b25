use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{BoardState, SubmitStatus, TxHandle, WalletStatus};

mod controller;
pub mod memory;
mod reconcile;
mod session;
mod store;

pub use controller::{SubmitOutcome, UpdateController};
pub use memory::InMemoryGateway;
pub use reconcile::{PassOutcome, Reconciler};
pub use session::{BoardSession, SessionOptions, DEFAULT_POLL_INTERVAL};
pub use store::ViewStateStore;

pub const STUB_WELCOME_MESSAGE: &str =
    "Welcome to the MessageBoard! Connect your wallet to update the message.";

/// Capability surface of the board contract as seen by the client core.
///
/// Reads are side-effect free and may fail transiently. A resolved read with
/// no content is reported as `None` and normalized by the caller. Writes are
/// two-phase: `write_message` returns once the wallet accepted the
/// transaction, `await_confirmation` once it is finalized.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    async fn read_message(&self) -> Result<Option<String>>;
    async fn read_author(&self) -> Result<Option<Address>>;
    async fn read_message_count(&self) -> Result<Option<U256>>;
    async fn write_message(&self, message: &str) -> Result<TxHandle>;
    async fn await_confirmation(&self, tx: &TxHandle) -> Result<()>;
    async fn is_connected(&self) -> Result<bool>;
    async fn connected_address(&self) -> Result<Option<Address>>;
    async fn connect(&self) -> Result<Address>;
}

/// Gateway for the unwired page: fixed welcome data, no wallet.
pub struct StubGateway;

#[async_trait]
impl BoardGateway for StubGateway {
    async fn read_message(&self) -> Result<Option<String>> {
        Ok(Some(STUB_WELCOME_MESSAGE.to_string()))
    }

    async fn read_author(&self) -> Result<Option<Address>> {
        Ok(Some(Address::ZERO))
    }

    async fn read_message_count(&self) -> Result<Option<U256>> {
        Ok(Some(U256::ZERO))
    }

    async fn write_message(&self, _message: &str) -> Result<TxHandle> {
        Err(anyhow!("message update not implemented yet"))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<()> {
        Err(anyhow!("no pending transaction {tx} on stub gateway"))
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(false)
    }

    async fn connected_address(&self) -> Result<Option<Address>> {
        Ok(None)
    }

    async fn connect(&self) -> Result<Address> {
        Err(anyhow!("wallet connection not implemented yet"))
    }
}

#[derive(Debug, Clone)]
pub enum BoardEvent {
    StateReplaced {
        pass: u64,
        state: BoardState,
        refreshed_at: DateTime<Utc>,
    },
    ReadFailed {
        pass: u64,
        error: String,
    },
    StatusChanged(SubmitStatus),
    WalletChanged(WalletStatus),
    WriteAccepted {
        tx: TxHandle,
    },
    WriteConfirmed {
        tx: TxHandle,
    },
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
