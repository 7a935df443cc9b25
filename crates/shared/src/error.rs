use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotConnected,
    AlreadyInProgress,
    GatewayRead,
    GatewayWrite,
    WalletConnect,
    ViewClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("a message update is already in progress")]
    AlreadyInProgress,
    #[error("gateway read failed: {0}")]
    GatewayRead(String),
    #[error("gateway write failed: {0}")]
    GatewayWrite(String),
    #[error("wallet connection failed: {0}")]
    WalletConnect(String),
    #[error("board view has been torn down")]
    ViewClosed,
}

impl BoardError {
    pub fn empty_message() -> Self {
        Self::Validation("empty message".into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::AlreadyInProgress => ErrorCode::AlreadyInProgress,
            Self::GatewayRead(_) => ErrorCode::GatewayRead,
            Self::GatewayWrite(_) => ErrorCode::GatewayWrite,
            Self::WalletConnect(_) => ErrorCode::WalletConnect,
            Self::ViewClosed => ErrorCode::ViewClosed,
        }
    }

    /// Text suitable for showing next to the submit form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Message cannot be empty".to_string(),
            Self::NotConnected => "Please connect your wallet first!".to_string(),
            Self::AlreadyInProgress => "An update is already being processed".to_string(),
            Self::GatewayRead(reason) | Self::GatewayWrite(reason) => reason.clone(),
            Self::WalletConnect(_) => {
                "Failed to connect wallet. Make sure a signer is configured!".to_string()
            }
            Self::ViewClosed => "The board view is closed".to_string(),
        }
    }
}

/// Serializable form of [`BoardError`] for machine-readable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&BoardError> for ErrorReport {
    fn from(value: &BoardError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
