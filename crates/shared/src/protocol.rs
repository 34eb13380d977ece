use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Placeholder shown when a `ProposalCreated` log carries no description.
pub const MISSING_DESCRIPTION: &str = "No description";

/// Decoded `ProposalCreated` log as returned by the governor binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCreatedLog {
    pub proposal_id: U256,
    pub proposer: Address,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// Read-only projection of a proposal. The id is kept as a decimal string so
/// 256-bit identifiers survive display and serialization untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub description: String,
    pub proposer: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl From<ProposalCreatedLog> for Proposal {
    fn from(log: ProposalCreatedLog) -> Self {
        let description = if log.description.is_empty() {
            MISSING_DESCRIPTION.to_string()
        } else {
            log.description
        };
        Self {
            id: log.proposal_id.to_string(),
            description,
            proposer: log.proposer,
            block_number: log.block_number,
        }
    }
}

/// Confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub wallet_address: Address,
    pub balance: String,
    pub connected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_id_is_rendered_in_decimal() {
        let log = ProposalCreatedLog {
            proposal_id: U256::MAX,
            proposer: Address::zero(),
            description: "raise quorum".into(),
            block_number: Some(7),
        };
        let proposal = Proposal::from(log);
        assert_eq!(
            proposal.id,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(proposal.description, "raise quorum");
        assert_eq!(proposal.block_number, Some(7));
    }

    #[test]
    fn empty_description_falls_back_to_placeholder() {
        let log = ProposalCreatedLog {
            proposal_id: U256::from(3u64),
            proposer: Address::zero(),
            description: String::new(),
            block_number: None,
        };
        assert_eq!(Proposal::from(log).description, MISSING_DESCRIPTION);
    }

    #[test]
    fn whitespace_description_is_kept() {
        let log = ProposalCreatedLog {
            proposal_id: U256::from(4u64),
            proposer: Address::zero(),
            description: "   ".into(),
            block_number: None,
        };
        assert_eq!(Proposal::from(log).description, "   ");
    }
}
