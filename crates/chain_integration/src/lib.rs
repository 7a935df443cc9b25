//! Live board gateway backed by an `alloy` JSON-RPC provider.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    signers::{local::PrivateKeySigner, Signer},
    sol,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use client_core::BoardGateway;
use shared::{
    domain::TxHandle,
    protocol::{CONTRACT_ADDRESS, DEFAULT_CHAIN_ID, DEFAULT_RPC_URL},
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

sol! {
    #[sol(rpc)]
    interface MessageBoard {
        function getMessage() external view returns (string);
        function author() external view returns (address);
        function messageCount() external view returns (uint256);
        function updateMessage(string newMessage) external;
    }
}

#[derive(Clone)]
pub struct ChainConfig {
    pub rpc_url: Url,
    pub contract_address: Address,
    pub chain_id: u64,
    /// Hex private key of the local signer; `None` means reads only.
    pub private_key: Option<String>,
}

impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChainConfig {
    pub fn monad_testnet() -> Result<Self> {
        Ok(Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).context("invalid default rpc url")?,
            contract_address: CONTRACT_ADDRESS,
            chain_id: DEFAULT_CHAIN_ID,
            private_key: None,
        })
    }
}

struct ConnectedWallet {
    address: Address,
    provider: DynProvider,
}

/// Gateway talking to the deployed board contract.
///
/// Reads go through an unsigned provider. Writes need `connect` first,
/// which builds a signing provider from the configured key and checks that
/// the endpoint serves the configured chain.
pub struct LiveGateway {
    config: ChainConfig,
    reader: DynProvider,
    signer: Option<PrivateKeySigner>,
    wallet: RwLock<Option<ConnectedWallet>>,
}

impl LiveGateway {
    pub async fn new(config: ChainConfig) -> Result<Self> {
        let signer = config
            .private_key
            .as_deref()
            .map(parse_signer)
            .transpose()?
            .map(|signer| signer.with_chain_id(Some(config.chain_id)));
        let reader = ProviderBuilder::new()
            .connect(config.rpc_url.as_str())
            .await
            .with_context(|| format!("failed to build provider for {}", config.rpc_url))?
            .erased();
        info!(
            rpc_url = %config.rpc_url,
            contract = %config.contract_address,
            chain_id = config.chain_id,
            signer = signer.is_some(),
            "live board gateway ready"
        );
        Ok(Self {
            config,
            reader,
            signer,
            wallet: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn board(&self) -> MessageBoard::MessageBoardInstance<&DynProvider> {
        MessageBoard::new(self.config.contract_address, &self.reader)
    }
}

fn parse_signer(key: &str) -> Result<PrivateKeySigner> {
    let key = key.trim();
    if key.is_empty() {
        bail!("empty private key");
    }
    key.parse::<PrivateKeySigner>()
        .map_err(|err| anyhow!("invalid private key: {err}"))
}

#[async_trait]
impl BoardGateway for LiveGateway {
    async fn read_message(&self) -> Result<Option<String>> {
        let message = self
            .board()
            .getMessage()
            .call()
            .await
            .context("getMessage call failed")?;
        Ok(Some(message))
    }

    async fn read_author(&self) -> Result<Option<Address>> {
        let author = self
            .board()
            .author()
            .call()
            .await
            .context("author call failed")?;
        Ok(Some(author))
    }

    async fn read_message_count(&self) -> Result<Option<U256>> {
        let count = self
            .board()
            .messageCount()
            .call()
            .await
            .context("messageCount call failed")?;
        Ok(Some(count))
    }

    async fn write_message(&self, message: &str) -> Result<TxHandle> {
        let wallet = self.wallet.read().await;
        let wallet = wallet.as_ref().ok_or_else(|| anyhow!("no wallet connected"))?;
        let pending = MessageBoard::new(self.config.contract_address, &wallet.provider)
            .updateMessage(message.to_string())
            .from(wallet.address)
            .send()
            .await
            .context("updateMessage transaction was rejected")?;
        let tx_hash = *pending.tx_hash();
        debug!(tx = %tx_hash, "updateMessage transaction sent");
        Ok(TxHandle(tx_hash.to_string()))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<()> {
        let tx_hash: B256 = tx
            .0
            .parse()
            .with_context(|| format!("invalid transaction hash {tx}"))?;
        let receipt = PendingTransactionBuilder::new(self.reader.root().clone(), tx_hash)
            .get_receipt()
            .await
            .with_context(|| format!("failed waiting for receipt of {tx_hash}"))?;
        if !receipt.status() {
            bail!("transaction {tx_hash} reverted");
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.wallet.read().await.is_some())
    }

    async fn connected_address(&self) -> Result<Option<Address>> {
        Ok(self.wallet.read().await.as_ref().map(|wallet| wallet.address))
    }

    async fn connect(&self) -> Result<Address> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| anyhow!("no signer configured; set BOARD_PRIVATE_KEY"))?;
        let address = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(self.config.rpc_url.as_str())
            .await
            .context("failed to build signing provider")?
            .erased();
        let chain_id = provider
            .get_chain_id()
            .await
            .context("failed to query chain id")?;
        if chain_id != self.config.chain_id {
            bail!(
                "wrong network: endpoint serves chain {chain_id}, expected {}",
                self.config.chain_id
            );
        }

        *self.wallet.write().await = Some(ConnectedWallet { address, provider });
        Ok(address)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
