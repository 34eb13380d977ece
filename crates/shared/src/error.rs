use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ProviderUnavailable,
    WalletConnectionFailed,
    TransactionFailed,
    QueryFailed,
    InvalidInput,
    NotConnected,
    ActionPending,
    AgentAlreadyAssigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("no wallet provider available")]
    ProviderUnavailable,
    #[error("wallet connection failed: {0}")]
    WalletConnectionFailed(String),
    #[error("{action} transaction failed: {reason}")]
    TransactionFailed { action: &'static str, reason: String },
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("another action is still pending")]
    ActionPending,
    #[error("agent {0} is already assigned")]
    AgentAlreadyAssigned(String),
}

impl GovernanceError {
    pub fn transaction(action: &'static str, reason: impl Into<String>) -> Self {
        Self::TransactionFailed {
            action,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ProviderUnavailable => ErrorCode::ProviderUnavailable,
            Self::WalletConnectionFailed(_) => ErrorCode::WalletConnectionFailed,
            Self::TransactionFailed { .. } => ErrorCode::TransactionFailed,
            Self::QueryFailed(_) => ErrorCode::QueryFailed,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::ActionPending => ErrorCode::ActionPending,
            Self::AgentAlreadyAssigned(_) => ErrorCode::AgentAlreadyAssigned,
        }
    }

    /// Text shown next to the control that triggered the failing action.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderUnavailable => {
                "No wallet found. Install a wallet or configure an RPC endpoint and retry.".into()
            }
            Self::WalletConnectionFailed(reason) => format!("Failed to connect wallet: {reason}"),
            Self::TransactionFailed { action, reason } => {
                format!("{action} failed: {reason}")
            }
            Self::QueryFailed(reason) => format!("Could not load data: {reason}"),
            Self::InvalidInput(reason) => reason.clone(),
            Self::NotConnected => "Connect your wallet first.".into(),
            Self::ActionPending => "Please wait for the pending action to finish.".into(),
            Self::AgentAlreadyAssigned(agent) => format!("Agent already assigned: {agent}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&GovernanceError> for ErrorReport {
    fn from(value: &GovernanceError) -> Self {
        Self::new(value.code(), value.user_message())
    }
}
