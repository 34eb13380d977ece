//! Display helpers for token amounts and account addresses.

use ethers::{
    types::{Address, U256},
    utils::to_checksum,
};

/// Renders `raw / 10^decimals` as a decimal string. Trailing fractional zeros
/// are dropped but one fractional digit is always kept, so one whole token
/// reads `"1.0"`.
pub fn format_units(raw: U256, decimals: u32) -> String {
    if decimals == 0 {
        return format!("{raw}.0");
    }

    let width = decimals as usize;
    let (whole, fraction) = raw.div_mod(U256::exp10(width));
    let mut fraction = format!("{:0>width$}", fraction.to_string());
    while fraction.len() > 1 && fraction.ends_with('0') {
        fraction.pop();
    }

    format!("{whole}.{fraction}")
}

/// `0x1234...abcd` form of the checksummed address.
pub fn short_address(address: Address) -> String {
    let full = to_checksum(&address, None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
