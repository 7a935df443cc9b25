use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

pub const LOADING_PLACEHOLDER: &str = "Loading...";
pub const EMPTY_MESSAGE_PLACEHOLDER: &str = "No message yet...";

/// Reconciled snapshot of the board contract.
///
/// Always replaced as a whole; a value of this type is one complete read
/// batch and never a mix of two.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub message: String,
    pub author: Address,
    pub message_count: U256,
}

impl BoardState {
    pub fn new(message: impl Into<String>, author: Address, message_count: U256) -> Self {
        Self {
            message: message.into(),
            author,
            message_count,
        }
    }

    /// Builds a state from raw gateway reads, substituting type defaults for
    /// values the gateway resolved without content.
    pub fn from_reads(
        message: Option<String>,
        author: Option<Address>,
        message_count: Option<U256>,
    ) -> Self {
        Self {
            message: message.unwrap_or_default(),
            author: author.unwrap_or(Address::ZERO),
            message_count: message_count.unwrap_or(U256::ZERO),
        }
    }

    pub fn has_author(&self) -> bool {
        !self.author.is_zero()
    }

    /// Text shown in the message panel.
    pub fn display_message(&self, loaded: bool) -> &str {
        if !loaded {
            LOADING_PLACEHOLDER
        } else if self.message.is_empty() {
            EMPTY_MESSAGE_PLACEHOLDER
        } else {
            &self.message
        }
    }

    pub fn display_author(&self) -> String {
        self.author.to_checksum(None)
    }

    pub fn count_badge(&self) -> String {
        format!("Message #{}", self.message_count)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    Confirming,
    Error(String),
}

impl SubmitStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitting | Self::Confirming)
    }

    /// Whether `self -> next` is a legal controller transition.
    pub fn can_transition_to(&self, next: &SubmitStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Submitting)
                | (Self::Submitting, Self::Confirming)
                | (Self::Submitting, Self::Error(_))
                | (Self::Confirming, Self::Idle)
                | (Self::Confirming, Self::Error(_))
                | (Self::Error(_), Self::Idle)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Confirming => "confirming",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl WalletStatus {
    pub fn connected(address: Address) -> Self {
        Self {
            connected: true,
            address: Some(address),
        }
    }

    /// Header button label: shortened address when connected.
    pub fn header_label(&self) -> String {
        match (self.connected, self.address) {
            (true, Some(address)) => short_address(&address),
            (true, None) => "Connected".to_string(),
            (false, _) => "Connect Wallet".to_string(),
        }
    }
}

/// `0x1234...abcd` form used in compact displays.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Opaque identifier of a submitted write, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
