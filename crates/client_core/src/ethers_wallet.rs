//! JSON-RPC wallet backed by `ethers`.
//!
//! Two account sources are supported. A node-managed account (a dev node with
//! unlocked accounts, or a signing proxy) answers `eth_requestAccounts`
//! itself, the same way a browser-injected wallet does. A local key wraps the
//! provider in `SignerMiddleware` and signs in-process.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dao_shared::{
    domain::VoteSupport,
    protocol::{ProposalCreatedLog, TxReceipt},
};
use ethers::{
    abi::Detokenize,
    contract::ContractCall,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, U256, U64},
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};
use url::Url;

use crate::{
    AgentFactoryContract, ContractError, GovernorContract, ProposalRequest, TokenContract,
    WalletEvent, WalletProvider,
};

mod bindings {
    use ethers::contract::abigen;

    abigen!(
        GovernanceToken,
        r#"[
            function balanceOf(address account) external view returns (uint256)
            function delegate(address delegatee) external
        ]"#
    );

    abigen!(
        Governor,
        r#"[
            function propose(address[] targets, uint256[] values, bytes[] calldatas, string description) external returns (uint256)
            function castVote(uint256 proposalId, uint8 support) external returns (uint256)
            event ProposalCreated(uint256 proposalId, address proposer, address[] targets, uint256[] values, string[] signatures, bytes[] calldatas, uint256 voteStart, uint256 voteEnd, string description)
        ]"#
    );

    abigen!(
        AgentFactory,
        r#"[
            function connectUserToAgent(address userAddress, address agentAddressReceived) external
            function getAgent(address userAddress) external view returns (address)
        ]"#
    );
}

use bindings::{AgentFactory, GovernanceToken, Governor};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountSource {
    Node,
    LocalKey(Address),
}

pub struct EthersWallet<M> {
    client: Arc<M>,
    accounts: AccountSource,
    events: broadcast::Sender<WalletEvent>,
}

fn http_provider(rpc_url: &str) -> Result<Provider<Http>, ContractError> {
    let url = Url::parse(rpc_url)
        .map_err(|err| ContractError::Rejected(format!("invalid rpc url {rpc_url}: {err}")))?;
    Ok(Provider::new(Http::new(url)))
}

impl EthersWallet<Provider<Http>> {
    /// Uses the accounts managed by the node behind `rpc_url`.
    pub fn node(rpc_url: &str) -> Result<Arc<Self>, ContractError> {
        let provider = http_provider(rpc_url)?;
        Ok(Self::from_client(Arc::new(provider), AccountSource::Node))
    }
}

impl EthersWallet<SignerClient> {
    /// Signs locally with `private_key` for `chain_id`.
    pub fn local_key(
        rpc_url: &str,
        private_key: &str,
        chain_id: u64,
    ) -> Result<Arc<Self>, ContractError> {
        let provider = http_provider(rpc_url)?;
        let signer = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|err| ContractError::Rejected(format!("invalid private key: {err}")))?
            .with_chain_id(chain_id);
        let account = signer.address();
        let client = SignerMiddleware::new(provider, signer);
        Ok(Self::from_client(
            Arc::new(client),
            AccountSource::LocalKey(account),
        ))
    }
}

impl<M: Middleware + 'static> EthersWallet<M> {
    fn from_client(client: Arc<M>, accounts: AccountSource) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            client,
            accounts,
            events,
        })
    }

    async fn chain_id(&self) -> Result<u64, ContractError> {
        self.client
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(|err| ContractError::Query(err.to_string()))
    }

    /// JSON-RPC has no push channel, so account and chain changes are found
    /// by polling. The first failed poll is reported as a disconnect and
    /// ends the watch.
    pub fn spawn_change_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let wallet = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_accounts = wallet.request_accounts().await.ok();
            let mut last_chain = wallet.chain_id().await.ok();
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let (accounts, chain) =
                    match (wallet.request_accounts().await, wallet.chain_id().await) {
                        (Ok(accounts), Ok(chain)) => (accounts, chain),
                        (Err(err), _) | (_, Err(err)) => {
                            warn!(error = %err, "wallet poll failed");
                            let _ = wallet.events.send(WalletEvent::Disconnected);
                            break;
                        }
                    };

                if last_chain.is_some_and(|last| last != chain) {
                    debug!(chain, "chain changed");
                    let _ = wallet.events.send(WalletEvent::ChainChanged(chain));
                }
                if last_accounts.as_ref().is_some_and(|last| *last != accounts) {
                    debug!(count = accounts.len(), "accounts changed");
                    let _ = wallet
                        .events
                        .send(WalletEvent::AccountsChanged(accounts.clone()));
                }
                last_chain = Some(chain);
                last_accounts = Some(accounts);
            }
        })
    }
}

#[async_trait]
impl<M: Middleware + 'static> WalletProvider for EthersWallet<M> {
    async fn request_accounts(&self) -> Result<Vec<Address>, ContractError> {
        match self.accounts {
            AccountSource::LocalKey(account) => Ok(vec![account]),
            AccountSource::Node => self
                .client
                .provider()
                .request::<_, Vec<Address>>("eth_requestAccounts", ())
                .await
                .map_err(|err| ContractError::Rejected(err.to_string())),
        }
    }

    fn bind_token(&self, address: Address, account: Address) -> Arc<dyn TokenContract> {
        Arc::new(EthersToken {
            contract: GovernanceToken::new(address, Arc::clone(&self.client)),
            account,
        })
    }

    fn bind_governor(&self, address: Address, account: Address) -> Arc<dyn GovernorContract> {
        Arc::new(EthersGovernor {
            contract: Governor::new(address, Arc::clone(&self.client)),
            account,
        })
    }

    fn bind_agent_factory(
        &self,
        address: Address,
        account: Address,
    ) -> Arc<dyn AgentFactoryContract> {
        Arc::new(EthersAgentFactory {
            contract: AgentFactory::new(address, Arc::clone(&self.client)),
            account,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

/// Sends `call` and waits for it to be mined.
async fn send_and_confirm<M, D>(call: ContractCall<M, D>) -> Result<TxReceipt, ContractError>
where
    M: Middleware + 'static,
    D: Detokenize + Send + Sync,
{
    let pending = call
        .send()
        .await
        .map_err(|err| ContractError::Submission(err.to_string()))?;
    let receipt = pending
        .await
        .map_err(|err| ContractError::Confirmation(err.to_string()))?
        .ok_or(ContractError::Dropped)?;

    if receipt.status == Some(U64::zero()) {
        return Err(ContractError::Reverted(format!(
            "{:?}",
            receipt.transaction_hash
        )));
    }

    Ok(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|block| block.as_u64()),
    })
}

struct EthersToken<M> {
    contract: GovernanceToken<M>,
    account: Address,
}

#[async_trait]
impl<M: Middleware + 'static> TokenContract for EthersToken<M> {
    async fn balance_of(&self, owner: Address) -> Result<U256, ContractError> {
        self.contract
            .balance_of(owner)
            .call()
            .await
            .map_err(|err| ContractError::Query(err.to_string()))
    }

    async fn delegate(&self, delegatee: Address) -> Result<TxReceipt, ContractError> {
        send_and_confirm(self.contract.delegate(delegatee).from(self.account)).await
    }
}

struct EthersGovernor<M> {
    contract: Governor<M>,
    account: Address,
}

#[async_trait]
impl<M: Middleware + 'static> GovernorContract for EthersGovernor<M> {
    async fn propose(&self, request: ProposalRequest) -> Result<TxReceipt, ContractError> {
        let call = self
            .contract
            .propose(
                request.targets,
                request.values,
                request.calldatas,
                request.description,
            )
            .from(self.account);
        send_and_confirm(call).await
    }

    async fn cast_vote(
        &self,
        proposal_id: U256,
        support: VoteSupport,
    ) -> Result<TxReceipt, ContractError> {
        let call = self
            .contract
            .cast_vote(proposal_id, support.code())
            .from(self.account);
        send_and_confirm(call).await
    }

    async fn proposal_created_logs(&self) -> Result<Vec<ProposalCreatedLog>, ContractError> {
        let logs = self
            .contract
            .proposal_created_filter()
            .from_block(0u64)
            .query_with_meta()
            .await
            .map_err(|err| ContractError::Query(err.to_string()))?;

        Ok(logs
            .into_iter()
            .map(|(event, meta)| ProposalCreatedLog {
                proposal_id: event.proposal_id,
                proposer: event.proposer,
                description: event.description,
                block_number: Some(meta.block_number.as_u64()),
            })
            .collect())
    }
}

struct EthersAgentFactory<M> {
    contract: AgentFactory<M>,
    account: Address,
}

#[async_trait]
impl<M: Middleware + 'static> AgentFactoryContract for EthersAgentFactory<M> {
    async fn get_agent(&self, user: Address) -> Result<Address, ContractError> {
        self.contract
            .get_agent(user)
            .call()
            .await
            .map_err(|err| ContractError::Query(err.to_string()))
    }

    async fn connect_user_to_agent(
        &self,
        user: Address,
        agent: Address,
    ) -> Result<TxReceipt, ContractError> {
        send_and_confirm(
            self.contract
                .connect_user_to_agent(user, agent)
                .from(self.account),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat account #0.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn local_key_wallet_reports_signer_account() {
        let wallet = EthersWallet::local_key("http://127.0.0.1:8545", DEV_KEY, 31337)
            .expect("wallet");
        let accounts = wallet.request_accounts().await.expect("accounts");
        assert_eq!(
            accounts,
            vec!["0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .expect("address")]
        );
    }

    #[test]
    fn rejects_unparseable_rpc_url() {
        let err = EthersWallet::node("not a url").err().expect("should fail");
        assert!(matches!(err, ContractError::Rejected(_)));
    }

    #[test]
    fn rejects_malformed_private_key() {
        let err = EthersWallet::local_key("http://127.0.0.1:8545", "not-a-hex-key", 31337)
            .err()
            .expect("should fail");
        assert!(matches!(err, ContractError::Rejected(_)));
    }
}
