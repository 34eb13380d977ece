use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dao_shared::{
    domain::VoteSupport,
    protocol::{ProposalCreatedLog, TxReceipt},
};
use ethers::types::{Address, H256, U256};
use tokio::sync::{broadcast, Notify};

use crate::{
    AgentFactoryContract, ContractError, GovernorContract, ProposalRequest, TokenContract,
    WalletEvent, WalletProvider,
};

pub(crate) fn account(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCall {
    RequestAccounts,
    BalanceOf(Address),
    Delegate { sender: Address, delegatee: Address },
    Propose(ProposalRequest),
    CastVote { proposal_id: U256, support: u8 },
    ProposalLogs,
    GetAgent(Address),
    ConnectAgent { user: Address, agent: Address },
}

#[derive(Default)]
pub(crate) struct ChainState {
    pub(crate) accounts: Vec<Address>,
    pub(crate) reject_accounts: Option<String>,
    pub(crate) balance: U256,
    pub(crate) fail_balance: Option<String>,
    pub(crate) logs: Vec<ProposalCreatedLog>,
    pub(crate) fail_logs: Option<String>,
    pub(crate) fail_delegate: Option<ContractError>,
    pub(crate) fail_propose: Option<ContractError>,
    pub(crate) fail_vote: Option<ContractError>,
    pub(crate) agent: Address,
    pub(crate) fail_connect_agent: Option<ContractError>,
    pub(crate) calls: Vec<RecordedCall>,
    next_tx: u64,
}

impl ChainState {
    fn receipt(&mut self) -> TxReceipt {
        self.next_tx += 1;
        TxReceipt {
            tx_hash: H256::from_low_u64_be(self.next_tx),
            block_number: Some(self.next_tx),
        }
    }
}

/// In-memory wallet and contracts. Transactions and log queries block on
/// `gate` when one is installed so tests can observe an action mid-flight.
#[derive(Clone)]
pub(crate) struct FakeWallet {
    pub(crate) chain: Arc<Mutex<ChainState>>,
    pub(crate) gate: Option<Arc<Notify>>,
    events: broadcast::Sender<WalletEvent>,
}

impl FakeWallet {
    pub(crate) fn with_accounts(accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            chain: Arc::new(Mutex::new(ChainState {
                accounts,
                ..ChainState::default()
            })),
            gate: None,
            events,
        }
    }

    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) fn configure(&self, f: impl FnOnce(&mut ChainState)) {
        f(&mut self.chain.lock().expect("chain lock"));
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.chain.lock().expect("chain lock").calls.clone()
    }

    pub(crate) fn push_log(&self, id: u64, description: &str) {
        self.configure(|chain| {
            chain.logs.push(ProposalCreatedLog {
                proposal_id: U256::from(id),
                proposer: account(0xaa),
                description: description.to_string(),
                block_number: Some(id),
            })
        });
    }

    /// Yields until a recorded call matches `matches`.
    pub(crate) async fn wait_for_call(&self, matches: impl Fn(&RecordedCall) -> bool) {
        while !self.calls().iter().any(&matches) {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, call: RecordedCall) {
        self.chain.lock().expect("chain lock").calls.push(call);
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn contracts(&self, sender: Address) -> Arc<FakeContracts> {
        Arc::new(FakeContracts {
            wallet: self.clone(),
            sender,
        })
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ContractError> {
        self.record(RecordedCall::RequestAccounts);
        let chain = self.chain.lock().expect("chain lock");
        match &chain.reject_accounts {
            Some(reason) => Err(ContractError::Rejected(reason.clone())),
            None => Ok(chain.accounts.clone()),
        }
    }

    fn bind_token(&self, _address: Address, account: Address) -> Arc<dyn TokenContract> {
        self.contracts(account)
    }

    fn bind_governor(&self, _address: Address, account: Address) -> Arc<dyn GovernorContract> {
        self.contracts(account)
    }

    fn bind_agent_factory(
        &self,
        _address: Address,
        account: Address,
    ) -> Arc<dyn AgentFactoryContract> {
        self.contracts(account)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

pub(crate) struct FakeContracts {
    wallet: FakeWallet,
    sender: Address,
}

#[async_trait]
impl TokenContract for FakeContracts {
    async fn balance_of(&self, owner: Address) -> Result<U256, ContractError> {
        self.wallet.record(RecordedCall::BalanceOf(owner));
        let chain = self.wallet.chain.lock().expect("chain lock");
        match &chain.fail_balance {
            Some(reason) => Err(ContractError::Query(reason.clone())),
            None => Ok(chain.balance),
        }
    }

    async fn delegate(&self, delegatee: Address) -> Result<TxReceipt, ContractError> {
        self.wallet.record(RecordedCall::Delegate {
            sender: self.sender,
            delegatee,
        });
        self.wallet.wait_gate().await;
        let mut chain = self.wallet.chain.lock().expect("chain lock");
        match chain.fail_delegate.clone() {
            Some(err) => Err(err),
            None => Ok(chain.receipt()),
        }
    }
}

#[async_trait]
impl GovernorContract for FakeContracts {
    async fn propose(&self, request: ProposalRequest) -> Result<TxReceipt, ContractError> {
        self.wallet.record(RecordedCall::Propose(request.clone()));
        self.wallet.wait_gate().await;
        let mut chain = self.wallet.chain.lock().expect("chain lock");
        if let Some(err) = chain.fail_propose.clone() {
            return Err(err);
        }
        let receipt = chain.receipt();
        let id = chain.logs.len() as u64 + 100;
        let proposer = self.sender;
        chain.logs.push(ProposalCreatedLog {
            proposal_id: U256::from(id),
            proposer,
            description: request.description,
            block_number: receipt.block_number,
        });
        Ok(receipt)
    }

    async fn cast_vote(
        &self,
        proposal_id: U256,
        support: VoteSupport,
    ) -> Result<TxReceipt, ContractError> {
        self.wallet.record(RecordedCall::CastVote {
            proposal_id,
            support: support.code(),
        });
        self.wallet.wait_gate().await;
        let mut chain = self.wallet.chain.lock().expect("chain lock");
        match chain.fail_vote.clone() {
            Some(err) => Err(err),
            None => Ok(chain.receipt()),
        }
    }

    async fn proposal_created_logs(&self) -> Result<Vec<ProposalCreatedLog>, ContractError> {
        self.wallet.record(RecordedCall::ProposalLogs);
        self.wallet.wait_gate().await;
        let chain = self.wallet.chain.lock().expect("chain lock");
        match &chain.fail_logs {
            Some(reason) => Err(ContractError::Query(reason.clone())),
            None => Ok(chain.logs.clone()),
        }
    }
}

#[async_trait]
impl AgentFactoryContract for FakeContracts {
    async fn get_agent(&self, user: Address) -> Result<Address, ContractError> {
        self.wallet.record(RecordedCall::GetAgent(user));
        Ok(self.wallet.chain.lock().expect("chain lock").agent)
    }

    async fn connect_user_to_agent(
        &self,
        user: Address,
        agent: Address,
    ) -> Result<TxReceipt, ContractError> {
        self.wallet.record(RecordedCall::ConnectAgent { user, agent });
        self.wallet.wait_gate().await;
        let mut chain = self.wallet.chain.lock().expect("chain lock");
        if let Some(err) = chain.fail_connect_agent.clone() {
            return Err(err);
        }
        chain.agent = agent;
        Ok(chain.receipt())
    }
}
