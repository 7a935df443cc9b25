use std::{fs, path::Path, time::Duration};

use alloy_primitives::Address;
use anyhow::{bail, Context};
use chain_integration::ChainConfig;
use shared::protocol::{CONTRACT_ADDRESS, DEFAULT_CHAIN_ID, DEFAULT_RPC_URL};
use url::Url;

const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Clone)]
pub struct Settings {
    pub rpc_url: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub poll_interval_ms: u64,
    pub private_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            contract_address: CONTRACT_ADDRESS.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            poll_interval_ms: 2000,
            private_key: None,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn chain_config(&self) -> anyhow::Result<ChainConfig> {
        let rpc_url = Url::parse(self.rpc_url.trim())
            .with_context(|| format!("invalid rpc url '{}'", self.rpc_url))?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            bail!("rpc url must be http or https, got '{}'", rpc_url.scheme());
        }
        let contract_address = self
            .contract_address
            .trim()
            .parse::<Address>()
            .with_context(|| format!("invalid contract address '{}'", self.contract_address))?;
        Ok(ChainConfig {
            rpc_url,
            contract_address,
            chain_id: self.chain_id,
            private_key: self.private_key.clone(),
        })
    }
}

/// Defaults, then `path` if it exists, then the process environment.
pub fn load_settings(path: &Path) -> Settings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, env);
    settings
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(table) = toml::from_str::<toml::Table>(raw) else {
        tracing::warn!("ignoring unparseable board config file");
        return;
    };
    let get = |key: &str| -> Option<String> {
        match table.get(key)? {
            toml::Value::String(v) => Some(v.clone()),
            toml::Value::Integer(v) => Some(v.to_string()),
            _ => None,
        }
    };

    if let Some(v) = get("rpc_url") {
        settings.rpc_url = v;
    }
    if let Some(v) = get("contract_address") {
        settings.contract_address = v;
    }
    if let Some(v) = get("chain_id").and_then(|v| v.parse().ok()) {
        settings.chain_id = v;
    }
    if let Some(v) = get("poll_interval_ms").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = v;
    }
}

pub(crate) fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    let lookup = |plain: &str, app: &str| env(app).or_else(|| env(plain));

    if let Some(v) = lookup("BOARD_RPC_URL", "APP__RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = lookup("BOARD_CONTRACT_ADDRESS", "APP__CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }
    if let Some(v) = lookup("BOARD_CHAIN_ID", "APP__CHAIN_ID").and_then(|v| v.parse().ok()) {
        settings.chain_id = v;
    }
    if let Some(v) =
        lookup("BOARD_POLL_INTERVAL_MS", "APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok())
    {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = env("BOARD_PRIVATE_KEY").filter(|v| !v.trim().is_empty()) {
        settings.private_key = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
