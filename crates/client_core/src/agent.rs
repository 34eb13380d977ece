//! Agent linking through the agent factory contract.

use dao_shared::{error::GovernanceError, protocol::TxReceipt};
use ethers::{types::Address, utils::to_checksum};
use tracing::{debug, info};

use crate::{address::parse_address, controller::ControllerEvent, GovernanceController};

impl GovernanceController {
    /// Agent currently assigned to the session account. The factory reports
    /// "no agent" as the zero address.
    pub async fn lookup_agent(&self) -> Result<Option<Address>, GovernanceError> {
        let result = self.query_agent().await;
        self.settle("lookup_agent", result, |agent| match agent {
            Some(agent) => format!("Agent address: {}", to_checksum(agent, None)),
            None => "No agent assigned yet".to_string(),
        })
        .await
    }

    async fn query_agent(&self) -> Result<Option<Address>, GovernanceError> {
        let (account, bindings, epoch) = self.current_bindings().await?;
        let agent = bindings
            .agent_factory
            .handle()
            .get_agent(account)
            .await
            .map_err(|err| GovernanceError::QueryFailed(err.to_string()))?;
        let agent = (!agent.is_zero()).then_some(agent);
        self.record_agent(agent, epoch).await;
        Ok(agent)
    }

    /// Links the session account to `agent_input`. The address is validated
    /// before anything is sent, and an account holds at most one agent.
    pub async fn connect_agent(&self, agent_input: &str) -> Result<TxReceipt, GovernanceError> {
        let result = self.link_agent(agent_input).await;
        self.settle("connect_agent", result, |_| {
            "Agent successfully connected!".to_string()
        })
        .await
    }

    async fn link_agent(&self, agent_input: &str) -> Result<TxReceipt, GovernanceError> {
        let agent = parse_address(agent_input)?;
        let (account, bindings, epoch) = self.current_bindings().await?;
        let _pending = self.pending.try_acquire()?;

        let cached = self.inner.read().await.agent;
        let known = match cached {
            Some(existing) => Some(existing),
            None => self.query_agent().await?,
        };
        if let Some(existing) = known {
            return Err(GovernanceError::AgentAlreadyAssigned(to_checksum(
                &existing, None,
            )));
        }

        debug!(user = %account, agent = %agent, "linking agent");
        let receipt = bindings
            .agent_factory
            .handle()
            .connect_user_to_agent(account, agent)
            .await
            .map_err(|err| GovernanceError::transaction("Agent link", err.to_string()))?;
        info!(agent = ?agent, tx = ?receipt.tx_hash, "agent linked");
        self.record_agent(Some(agent), epoch).await;
        Ok(receipt)
    }

    async fn record_agent(&self, agent: Option<Address>, epoch: u64) {
        {
            let mut guard = self.inner.write().await;
            if guard.epoch != epoch {
                return;
            }
            guard.agent = agent;
        }
        self.emit(ControllerEvent::AgentUpdated(agent));
    }
}

#[cfg(test)]
#[path = "tests/agent_tests.rs"]
mod tests;
