//! Session and proposal flow: wallet connection, contract bindings, and the
//! user actions that go through them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dao_shared::{
    domain::{ConnectionState, ContractAddresses, VoteSupport, TOKEN_DECIMALS},
    error::{ErrorCode, GovernanceError},
    protocol::{Proposal, SessionSummary, TxReceipt},
};
use ethers::types::{Address, U256};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    units::format_units, ContractBinding, GovernorContract, PendingAction, ProposalRequest,
    SessionBindings, WalletEvent, WalletProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub wallet_address: Address,
    pub raw_balance: U256,
    pub balance: String,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            wallet_address: self.wallet_address,
            balance: self.balance.clone(),
            connected_at: self.connected_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// Inline status text shown next to the control that triggered an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
    pub code: Option<ErrorCode>,
}

impl StatusLine {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            message: message.into(),
            code: None,
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Success,
            message: message.into(),
            code: None,
        }
    }

    fn failure(err: &GovernanceError) -> Self {
        Self {
            level: StatusLevel::Error,
            message: err.user_message(),
            code: Some(err.code()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SessionEstablished(SessionSummary),
    SessionEnded { reason: String },
    ProposalsUpdated(Vec<Proposal>),
    AgentUpdated(Option<Address>),
    Status(StatusLine),
}

pub(crate) struct ControllerState {
    pub(crate) connection: ConnectionState,
    pub(crate) session: Option<Session>,
    pub(crate) bindings: Option<SessionBindings>,
    pub(crate) proposals: Vec<Proposal>,
    pub(crate) agent: Option<Address>,
    pub(crate) status: Option<StatusLine>,
    /// Bumped whenever a session starts or ends; results of calls issued under
    /// an older epoch are discarded.
    pub(crate) epoch: u64,
}

impl ControllerState {
    fn reset_session(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.session = None;
        self.bindings = None;
        self.proposals.clear();
        self.agent = None;
        self.epoch += 1;
    }
}

pub struct GovernanceController {
    wallet: Option<Arc<dyn WalletProvider>>,
    addresses: ContractAddresses,
    pub(crate) pending: PendingAction,
    pub(crate) inner: RwLock<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl GovernanceController {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>) -> Arc<Self> {
        Self::with_addresses(wallet, ContractAddresses::default())
    }

    pub fn with_addresses(
        wallet: Option<Arc<dyn WalletProvider>>,
        addresses: ContractAddresses,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            wallet,
            addresses,
            pending: PendingAction::default(),
            inner: RwLock::new(ControllerState {
                connection: ConnectionState::Disconnected,
                session: None,
                bindings: None,
                proposals: Vec::new(),
                agent: None,
                status: None,
                epoch: 0,
            }),
            events,
        })
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.read().await.connection
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.read().await.session.clone()
    }

    pub async fn proposals(&self) -> Vec<Proposal> {
        self.inner.read().await.proposals.clone()
    }

    pub async fn agent(&self) -> Option<Address> {
        self.inner.read().await.agent
    }

    pub async fn status(&self) -> Option<StatusLine> {
        self.inner.read().await.status.clone()
    }

    pub(crate) fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) async fn set_status(&self, status: StatusLine) {
        self.inner.write().await.status = Some(status.clone());
        self.emit(ControllerEvent::Status(status));
    }

    /// Converts the outcome of an action into status text and logs failures.
    pub(crate) async fn settle<T>(
        &self,
        action: &'static str,
        result: Result<T, GovernanceError>,
        success: impl FnOnce(&T) -> String,
    ) -> Result<T, GovernanceError> {
        match &result {
            Ok(value) => self.set_status(StatusLine::success(success(value))).await,
            Err(err) => {
                error!(action, code = ?err.code(), error = %err, "governance action failed");
                self.set_status(StatusLine::failure(err)).await;
            }
        }
        result
    }

    pub async fn connect(&self) -> Result<SessionSummary, GovernanceError> {
        let result = self.establish_session().await;
        self.settle("connect", result, |summary| {
            format!("Connected: {}", crate::units::short_address(summary.wallet_address))
        })
        .await
    }

    async fn establish_session(&self) -> Result<SessionSummary, GovernanceError> {
        let Some(wallet) = self.wallet.clone() else {
            return Err(GovernanceError::ProviderUnavailable);
        };

        self.inner.write().await.connection = ConnectionState::Connecting;

        match self.open_session(wallet.as_ref()).await {
            Ok((session, bindings)) => {
                let summary = session.summary();
                {
                    let mut guard = self.inner.write().await;
                    guard.reset_session();
                    guard.connection = ConnectionState::Connected;
                    guard.session = Some(session);
                    guard.bindings = Some(bindings);
                }
                info!(
                    account = %summary.wallet_address,
                    balance = %summary.balance,
                    "wallet connected"
                );
                self.emit(ControllerEvent::SessionEstablished(summary.clone()));
                Ok(summary)
            }
            Err(err) => {
                // A failed reconnect leaves the live session in place.
                let mut guard = self.inner.write().await;
                guard.connection = if guard.session.is_some() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                };
                Err(err)
            }
        }
    }

    async fn open_session(
        &self,
        wallet: &dyn WalletProvider,
    ) -> Result<(Session, SessionBindings), GovernanceError> {
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|err| GovernanceError::WalletConnectionFailed(err.to_string()))?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| GovernanceError::WalletConnectionFailed("no accounts found".into()))?;

        let bindings = SessionBindings::bind(wallet, &self.addresses, account);
        let raw_balance = bindings
            .token
            .handle()
            .balance_of(account)
            .await
            .map_err(|err| GovernanceError::WalletConnectionFailed(err.to_string()))?;

        let session = Session {
            wallet_address: account,
            raw_balance,
            balance: format_units(raw_balance, TOKEN_DECIMALS),
            connected_at: Utc::now(),
        };
        Ok((session, bindings))
    }

    /// Ends the current session, if any. Returns whether one was active.
    pub async fn disconnect(&self, reason: &str) -> bool {
        let was_connected = {
            let mut guard = self.inner.write().await;
            let was_connected = guard.session.is_some();
            guard.reset_session();
            was_connected
        };
        if was_connected {
            info!(reason, "wallet session ended");
            self.emit(ControllerEvent::SessionEnded {
                reason: reason.to_string(),
            });
            self.set_status(StatusLine::info(format!("Disconnected: {reason}")))
                .await;
        }
        was_connected
    }

    /// Reacts to a change pushed by the wallet. Any change of account or
    /// network invalidates the bindings, so the session is dropped and the
    /// user reconnects explicitly.
    pub async fn apply_wallet_event(&self, event: WalletEvent) -> bool {
        let current = self
            .inner
            .read()
            .await
            .session
            .as_ref()
            .map(|session| session.wallet_address);
        let Some(current) = current else {
            debug!(?event, "wallet event without active session");
            return false;
        };

        match event {
            WalletEvent::Disconnected => self.disconnect("wallet disconnected").await,
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                None => self.disconnect("wallet locked or access revoked").await,
                Some(account) if *account != current => {
                    self.disconnect("wallet account changed").await
                }
                Some(_) => false,
            },
            WalletEvent::ChainChanged(chain_id) => {
                self.disconnect(&format!("network changed to chain {chain_id}"))
                    .await
            }
        }
    }

    /// Applies wallet notifications until the wallet drops its sender.
    pub fn watch_wallet_events(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.wallet.as_ref()?.subscribe();
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        controller.apply_wallet_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    pub(crate) async fn current_bindings(
        &self,
    ) -> Result<(Address, SessionBindings, u64), GovernanceError> {
        let guard = self.inner.read().await;
        match (&guard.session, &guard.bindings) {
            (Some(session), Some(bindings)) => {
                Ok((session.wallet_address, bindings.clone(), guard.epoch))
            }
            _ => Err(GovernanceError::NotConnected),
        }
    }

    pub async fn delegate_votes(&self) -> Result<TxReceipt, GovernanceError> {
        let result = self.delegate_to_self().await;
        self.settle("delegate", result, |_| "Votes delegated".to_string())
            .await
    }

    async fn delegate_to_self(&self) -> Result<TxReceipt, GovernanceError> {
        let (account, bindings, _) = self.current_bindings().await?;
        let _pending = self.pending.try_acquire()?;
        debug!(delegatee = %account, "submitting delegation");
        bindings
            .token
            .handle()
            .delegate(account)
            .await
            .map_err(|err| GovernanceError::transaction("Delegation", err.to_string()))
    }

    /// Submits a proposal and refreshes the proposal list once it is mined.
    /// A failed refresh is reported but does not fail the submission.
    pub async fn create_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<TxReceipt, GovernanceError> {
        let result = self.submit_proposal(request).await;
        match result {
            Ok((receipt, None)) => {
                self.set_status(StatusLine::success("Proposal created")).await;
                Ok(receipt)
            }
            Ok((receipt, Some(refresh_err))) => {
                warn!(error = %refresh_err, "proposal created but refresh failed");
                self.set_status(StatusLine::info(format!(
                    "Proposal created, but the proposal list could not be refreshed: {}",
                    refresh_err.user_message()
                )))
                .await;
                Ok(receipt)
            }
            Err(err) => self.settle("create_proposal", Err(err), |_| String::new()).await,
        }
    }

    async fn submit_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<(TxReceipt, Option<GovernanceError>), GovernanceError> {
        let (_, bindings, epoch) = self.current_bindings().await?;
        let _pending = self.pending.try_acquire()?;
        debug!(
            targets = request.targets.len(),
            description_len = request.description.len(),
            "submitting proposal"
        );
        let receipt = bindings
            .governor
            .handle()
            .propose(request)
            .await
            .map_err(|err| GovernanceError::transaction("Proposal creation", err.to_string()))?;
        info!(tx = ?receipt.tx_hash, "proposal created");

        let refresh = self.refresh_proposals(&bindings.governor, epoch).await;
        Ok((receipt, refresh.err()))
    }

    pub async fn fetch_proposals(&self) -> Result<Vec<Proposal>, GovernanceError> {
        let result = self.fetch_with_flag().await;
        self.settle("fetch_proposals", result, |proposals| {
            format!("Loaded {} proposal(s)", proposals.len())
        })
        .await
    }

    async fn fetch_with_flag(&self) -> Result<Vec<Proposal>, GovernanceError> {
        let (_, bindings, epoch) = self.current_bindings().await?;
        let _pending = self.pending.try_acquire()?;
        self.refresh_proposals(&bindings.governor, epoch).await
    }

    /// Replaces the proposal list with a fresh read of every
    /// `ProposalCreated` log. On failure the previous list is kept, and a read
    /// that outlived its session is reported as `NotConnected`.
    async fn refresh_proposals(
        &self,
        governor: &ContractBinding<dyn GovernorContract>,
        epoch: u64,
    ) -> Result<Vec<Proposal>, GovernanceError> {
        let logs = governor
            .handle()
            .proposal_created_logs()
            .await
            .map_err(|err| GovernanceError::QueryFailed(err.to_string()))?;
        let proposals: Vec<Proposal> = logs.into_iter().map(Proposal::from).collect();

        {
            let mut guard = self.inner.write().await;
            if guard.epoch != epoch {
                debug!("discarding proposals fetched for a previous session");
                return Err(GovernanceError::NotConnected);
            }
            guard.proposals = proposals.clone();
        }
        info!(count = proposals.len(), "proposals refreshed");
        self.emit(ControllerEvent::ProposalsUpdated(proposals.clone()));
        Ok(proposals)
    }

    pub async fn vote_on_proposal(
        &self,
        proposal_id: &str,
        support: bool,
    ) -> Result<TxReceipt, GovernanceError> {
        let result = self.cast_vote(proposal_id, support.into()).await;
        self.settle("vote", result, |_| "Vote submitted".to_string())
            .await
    }

    async fn cast_vote(
        &self,
        proposal_id: &str,
        support: VoteSupport,
    ) -> Result<TxReceipt, GovernanceError> {
        let id = parse_proposal_id(proposal_id)?;
        let (_, bindings, _) = self.current_bindings().await?;
        let _pending = self.pending.try_acquire()?;
        debug!(proposal_id = %id, support = support.code(), "casting vote");
        bindings
            .governor
            .handle()
            .cast_vote(id, support)
            .await
            .map_err(|err| GovernanceError::transaction("Vote", err.to_string()))
    }
}

/// Proposal ids are 256-bit and travel as decimal strings.
pub(crate) fn parse_proposal_id(input: &str) -> Result<U256, GovernanceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(GovernanceError::InvalidInput(format!(
            "Invalid proposal id: {input:?}"
        )));
    }
    U256::from_dec_str(trimmed)
        .map_err(|_| GovernanceError::InvalidInput(format!("Proposal id out of range: {input}")))
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
