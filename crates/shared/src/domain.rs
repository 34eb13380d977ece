use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};

/// Governance token deployment (`balanceOf`, `delegate`).
pub const TOKEN_ADDRESS: Address = H160([
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f,
    0x64, 0x18, 0x0a, 0xa3,
]);

/// Governor deployment (`propose`, `castVote`, `ProposalCreated`).
pub const GOVERNOR_ADDRESS: Address = H160([
    0xdc, 0x64, 0xa1, 0x40, 0xaa, 0x3e, 0x98, 0x11, 0x00, 0xa9, 0xbe, 0xca, 0x4e, 0x68, 0x5f, 0x96,
    0x2f, 0x0c, 0xf6, 0xc9,
]);

/// Agent factory deployment (`getAgent`, `connectUserToAgent`).
pub const AGENT_FACTORY_ADDRESS: Address = H160([
    0x5f, 0xc8, 0xd3, 0x26, 0x90, 0xcc, 0x91, 0xd4, 0xc3, 0x9d, 0x9d, 0x3a, 0xbc, 0xbd, 0x16, 0x98,
    0x9f, 0x87, 0x57, 0x07,
]);

/// Fixed decimal precision of the governance token.
pub const TOKEN_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Token,
    Governor,
    AgentFactory,
}

impl ContractKind {
    /// Name of the ABI the binding is generated from.
    pub fn abi_name(self) -> &'static str {
        match self {
            Self::Token => "AiDaoToken",
            Self::Governor => "AiDaoGovernor",
            Self::AgentFactory => "AgentFactory",
        }
    }
}

/// Binary vote support code. Abstention is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteSupport {
    Against,
    For,
}

impl VoteSupport {
    pub fn code(self) -> u8 {
        match self {
            Self::Against => 0,
            Self::For => 1,
        }
    }
}

impl From<bool> for VoteSupport {
    fn from(support: bool) -> Self {
        if support {
            Self::For
        } else {
            Self::Against
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub token: Address,
    pub governor: Address,
    pub agent_factory: Address,
}

impl ContractAddresses {
    pub fn address_of(&self, kind: ContractKind) -> Address {
        match kind {
            ContractKind::Token => self.token,
            ContractKind::Governor => self.governor,
            ContractKind::AgentFactory => self.agent_factory,
        }
    }
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            token: TOKEN_ADDRESS,
            governor: GOVERNOR_ADDRESS,
            agent_factory: AGENT_FACTORY_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn fixed_addresses_match_deployments() {
        assert_eq!(
            TOKEN_ADDRESS,
            Address::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3").expect("token")
        );
        assert_eq!(
            GOVERNOR_ADDRESS,
            Address::from_str("0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9").expect("governor")
        );
        assert_eq!(
            AGENT_FACTORY_ADDRESS,
            Address::from_str("0x5FC8d32690cc91D4c39d9d3abcBD16989F875707").expect("factory")
        );
    }

    #[test]
    fn vote_support_codes_are_binary() {
        assert_eq!(VoteSupport::from(true).code(), 1);
        assert_eq!(VoteSupport::from(false).code(), 0);
    }

    #[test]
    fn contract_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ContractKind::AgentFactory).expect("json");
        assert_eq!(json, "\"agent_factory\"");
    }
}
