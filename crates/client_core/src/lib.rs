use std::sync::Arc;

use async_trait::async_trait;
use dao_shared::{
    domain::{ContractAddresses, ContractKind, VoteSupport},
    protocol::{ProposalCreatedLog, TxReceipt},
};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod address;
mod agent;
mod controller;
pub mod ethers_wallet;
mod pending;
pub mod units;

pub use controller::{ControllerEvent, GovernanceController, Session, StatusLevel, StatusLine};
pub use ethers_wallet::EthersWallet;
pub use pending::{PendingAction, PendingGuard};

/// Failure reported by a wallet or contract adapter. The controller maps these
/// onto the user-facing error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transaction submission failed: {0}")]
    Submission(String),
    #[error("transaction confirmation failed: {0}")]
    Confirmation(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("transaction dropped from mempool")]
    Dropped,
    #[error("contract query failed: {0}")]
    Query(String),
}

/// Notifications pushed by the wallet when its account or network changes
/// outside of this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

/// Arguments of a governor `propose` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub calldatas: Vec<Bytes>,
    pub description: String,
}

impl ProposalRequest {
    /// Text-only proposal with no executable actions attached.
    pub fn signalling(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn balance_of(&self, owner: Address) -> Result<U256, ContractError>;
    async fn delegate(&self, delegatee: Address) -> Result<TxReceipt, ContractError>;
}

#[async_trait]
pub trait GovernorContract: Send + Sync {
    async fn propose(&self, request: ProposalRequest) -> Result<TxReceipt, ContractError>;
    async fn cast_vote(
        &self,
        proposal_id: U256,
        support: VoteSupport,
    ) -> Result<TxReceipt, ContractError>;
    /// Every `ProposalCreated` log the governor has emitted, oldest first.
    async fn proposal_created_logs(&self) -> Result<Vec<ProposalCreatedLog>, ContractError>;
}

#[async_trait]
pub trait AgentFactoryContract: Send + Sync {
    async fn get_agent(&self, user: Address) -> Result<Address, ContractError>;
    async fn connect_user_to_agent(
        &self,
        user: Address,
        agent: Address,
    ) -> Result<TxReceipt, ContractError>;
}

/// Wallet capability handed to the controller. Bindings created through it
/// sign and send as `account`.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, ContractError>;
    fn bind_token(&self, address: Address, account: Address) -> Arc<dyn TokenContract>;
    fn bind_governor(&self, address: Address, account: Address) -> Arc<dyn GovernorContract>;
    fn bind_agent_factory(
        &self,
        address: Address,
        account: Address,
    ) -> Arc<dyn AgentFactoryContract>;
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// A contract handle tied to the session account it was created for.
pub struct ContractBinding<C: ?Sized> {
    kind: ContractKind,
    address: Address,
    account: Address,
    handle: Arc<C>,
}

impl<C: ?Sized> ContractBinding<C> {
    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn abi_name(&self) -> &'static str {
        self.kind.abi_name()
    }

    pub fn handle(&self) -> &C {
        &self.handle
    }
}

impl<C: ?Sized> Clone for ContractBinding<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            address: self.address,
            account: self.account,
            handle: Arc::clone(&self.handle),
        }
    }
}

#[derive(Clone)]
pub(crate) struct SessionBindings {
    pub(crate) token: ContractBinding<dyn TokenContract>,
    pub(crate) governor: ContractBinding<dyn GovernorContract>,
    pub(crate) agent_factory: ContractBinding<dyn AgentFactoryContract>,
}

impl SessionBindings {
    pub(crate) fn bind(
        wallet: &dyn WalletProvider,
        addresses: &ContractAddresses,
        account: Address,
    ) -> Self {
        let token = addresses.address_of(ContractKind::Token);
        let governor = addresses.address_of(ContractKind::Governor);
        let agent_factory = addresses.address_of(ContractKind::AgentFactory);
        Self {
            token: ContractBinding {
                kind: ContractKind::Token,
                address: token,
                account,
                handle: wallet.bind_token(token, account),
            },
            governor: ContractBinding {
                kind: ContractKind::Governor,
                address: governor,
                account,
                handle: wallet.bind_governor(governor, account),
            },
            agent_factory: ContractBinding {
                kind: ContractKind::AgentFactory,
                address: agent_factory,
                account,
                handle: wallet.bind_agent_factory(agent_factory, account),
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
