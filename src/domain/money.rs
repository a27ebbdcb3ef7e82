//! Parsing of wei amounts, transaction hashes and wallet addresses.
//!
//! Amounts are 256-bit unsigned integers end to end; nothing here goes through floating point.

use alloy::primitives::{Address, B256, U256};
use std::str::FromStr;

/// Parses a positive integer decimal string (ASCII digits only, no sign, no separators).
pub fn parse_price_amount(raw: &str) -> Result<U256, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("price amount is required".to_string());
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("price amount '{}' must contain digits only", raw));
    }
    let value = U256::from_str_radix(s, 10)
        .map_err(|_| format!("price amount '{}' does not fit in 256 bits", raw))?;
    if value.is_zero() {
        return Err("price amount must be greater than zero".to_string());
    }
    Ok(value)
}

/// Returns true when `paid` covers `price`.
pub fn covers_price(paid: U256, price: U256) -> bool {
    paid >= price
}

/// Normalizes a transaction hash to lower-case `0x`-prefixed hex.
pub fn parse_tx_hash(raw: &str) -> Result<B256, String> {
    let s = raw.trim();
    let with_prefix = if s.starts_with("0x") || s.starts_with("0X") {
        format!("0x{}", &s[2..])
    } else {
        format!("0x{}", s)
    };
    B256::from_str(&with_prefix).map_err(|_| format!("invalid transaction hash '{}'", raw))
}

pub fn tx_hash_string(hash: &B256) -> String {
    format!("{:#x}", hash)
}

pub fn parse_address(raw: &str) -> Result<Address, String> {
    Address::from_str(raw.trim()).map_err(|_| format!("invalid wallet address '{}'", raw))
}

/// Lower-case hex form used as the stored buyer identity.
pub fn address_string(address: &Address) -> String {
    format!("{:#x}", address)
}
