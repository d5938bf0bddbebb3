//! Hex quantity/data helpers for Ethereum JSON-RPC values.

use std::str::FromStr;

use alloy_primitives::U256;
use chain_api::ChainError;
use serde_json::Value;

fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, ChainError> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("{what}: expected a hex string, got {value}")))
}

pub(crate) fn quantity_u256(value: &Value, what: &str) -> Result<U256, ChainError> {
    let s = as_str(value, what)?;
    if !s.starts_with("0x") {
        return Err(ChainError::Decode(format!("{what}: missing 0x prefix in {s}")));
    }
    U256::from_str(s).map_err(|e| ChainError::Decode(format!("{what}: {e}")))
}

pub(crate) fn quantity_u128(value: &Value, what: &str) -> Result<u128, ChainError> {
    let v = quantity_u256(value, what)?;
    u128::try_from(v).map_err(|_| ChainError::Decode(format!("{what}: {v} overflows u128")))
}

pub(crate) fn quantity_u64(value: &Value, what: &str) -> Result<u64, ChainError> {
    let v = quantity_u256(value, what)?;
    u64::try_from(v).map_err(|_| ChainError::Decode(format!("{what}: {v} overflows u64")))
}

pub(crate) fn data_bytes(value: &Value, what: &str) -> Result<Vec<u8>, ChainError> {
    let s = as_str(value, what)?;
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| ChainError::Decode(format!("{what}: {e}")))
}

pub(crate) fn quantity<T: std::fmt::LowerHex>(value: T) -> String {
    format!("0x{value:x}")
}

pub(crate) fn data_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
