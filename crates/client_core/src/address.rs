use std::str::FromStr;

use dao_shared::error::GovernanceError;
use ethers::{types::Address, utils::to_checksum};

const INVALID_ADDRESS: &str = "Invalid Ethereum address.";

/// Parses a user-supplied address. Mixed-case input must carry a valid
/// EIP-55 checksum; all-lowercase or all-uppercase input is taken as is.
pub fn parse_address(input: &str) -> Result<Address, GovernanceError> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GovernanceError::InvalidInput(INVALID_ADDRESS.into()));
    }

    let address = Address::from_str(body)
        .map_err(|_| GovernanceError::InvalidInput(INVALID_ADDRESS.into()))?;

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address, None)[2..] != *body {
        return Err(GovernanceError::InvalidInput(format!(
            "{INVALID_ADDRESS} Checksum mismatch."
        )));
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_checksummed_and_single_case_forms() {
        let checksummed = parse_address("0x5FbDB2315678afecb367f032d93F642f64180aa3").expect("ok");
        let lower = parse_address("0x5fbdb2315678afecb367f032d93f642f64180aa3").expect("ok");
        let upper = parse_address("5FBDB2315678AFECB367F032D93F642F64180AA3").expect("ok");
        assert_eq!(checksummed, lower);
        assert_eq!(lower, upper);
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["not-an-address", "", "0x1234", "0xZZbDB2315678afecb367f032d93F642f64180aa3"] {
            let err = parse_address(input).expect_err("should fail");
            assert!(matches!(err, GovernanceError::InvalidInput(_)), "{input}");
        }
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = parse_address("0x5fbDB2315678afecb367f032d93F642f64180aa3").expect_err("checksum");
        assert!(matches!(err, GovernanceError::InvalidInput(_)));
    }
}
