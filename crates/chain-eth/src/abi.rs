//! Minimal Solidity ABI encoding for the calls the wallet makes.
//!
//! Static words and dynamic `bytes` (head/tail layout) only; no full ABI
//! parser is needed for token transfers and Safe calls.

use alloy_primitives::{Address, U256};
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// A single ABI-encoded parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiParam {
    /// Left-padded to 32 bytes.
    Address(Address),
    Uint(U256),
    Bool(bool),
    /// `bytes32`-style value, right-padded. At most 32 bytes.
    FixedBytes(Vec<u8>),
    /// Dynamic `bytes`, encoded in the tail.
    Bytes(Vec<u8>),
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word_from_static(param: &AbiParam) -> [u8; 32] {
    let mut word = [0u8; 32];
    match param {
        AbiParam::Address(addr) => word[12..].copy_from_slice(addr.as_slice()),
        AbiParam::Uint(value) => word = value.to_be_bytes::<32>(),
        AbiParam::Bool(flag) => word[31] = u8::from(*flag),
        AbiParam::FixedBytes(bytes) => {
            let len = bytes.len().min(32);
            word[..len].copy_from_slice(&bytes[..len]);
        }
        AbiParam::Bytes(_) => {}
    }
    word
}

/// Encodes a parameter tuple with the standard head/tail layout.
pub fn encode_params(params: &[AbiParam]) -> Vec<u8> {
    let head_len = params.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for param in params {
        match param {
            AbiParam::Bytes(bytes) => {
                let offset = U256::from(head_len + tail.len());
                head.extend_from_slice(&offset.to_be_bytes::<32>());
                tail.extend_from_slice(&U256::from(bytes.len()).to_be_bytes::<32>());
                tail.extend_from_slice(bytes);
                let pad = (32 - bytes.len() % 32) % 32;
                tail.extend(std::iter::repeat(0u8).take(pad));
            }
            other => head.extend_from_slice(&word_from_static(other)),
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// `selector || encode_params(params)`.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend_from_slice(&encode_params(params));
    data
}

/// Encodes a call from its canonical signature, e.g. `"balanceOf(address)"`.
pub fn encode_call(signature: &str, params: &[AbiParam]) -> Vec<u8> {
    encode_function_call(selector(signature), params)
}

fn word(data: &[u8], index: usize) -> Result<&[u8], EthError> {
    data.get(index * 32..index * 32 + 32).ok_or_else(|| {
        EthError::EncodingError(format!(
            "return data too short: {} bytes, need word {index}",
            data.len()
        ))
    })
}

/// Reads the `index`-th 32-byte word as a uint256.
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, EthError> {
    Ok(U256::from_be_slice(word(data, index)?))
}

fn decode_usize(data: &[u8], index: usize) -> Result<usize, EthError> {
    let value = decode_uint(data, index)?;
    u64::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| EthError::EncodingError(format!("offset or length too large: {value}")))
}

/// Decodes a single returned `address[]`.
pub fn decode_address_array(data: &[u8]) -> Result<Vec<Address>, EthError> {
    let offset = decode_usize(data, 0)?;
    if offset % 32 != 0 {
        return Err(EthError::EncodingError(format!("misaligned array offset {offset}")));
    }
    let base = offset / 32;
    let len = decode_usize(data, base)?;
    (0..len)
        .map(|i| {
            let w = word(data, base + 1 + i)?;
            Ok(Address::from_slice(&w[12..]))
        })
        .collect()
}
