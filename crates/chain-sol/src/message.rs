//! Off-chain message signing.
//!
//! Personal messages are wrapped in the off-chain header
//! `"\xffsolana offchain" ++ version ++ format ++ length (u16 LE)` so that a
//! signature over them can never be replayed as a transaction.

use ed25519_dalek::{Signature, Signer, VerifyingKey};

use crate::address::{address_to_bytes, signing_key};
use crate::error::SolError;

pub const OFFCHAIN_SIGNING_DOMAIN: &[u8; 16] = b"\xffsolana offchain";

const OFFCHAIN_VERSION: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum MessageFormat {
    RestrictedAscii = 0,
    LimitedUtf8 = 1,
    ExtendedUtf8 = 2,
}

fn format_of(message: &[u8]) -> MessageFormat {
    if message.iter().all(|b| (0x20..=0x7e).contains(b)) {
        MessageFormat::RestrictedAscii
    } else if std::str::from_utf8(message).is_ok() && message.len() <= 1212 {
        MessageFormat::LimitedUtf8
    } else {
        MessageFormat::ExtendedUtf8
    }
}

/// Bytes actually signed for a personal message.
pub fn offchain_message(message: &[u8]) -> Result<Vec<u8>, SolError> {
    let len = u16::try_from(message.len()).map_err(|_| {
        SolError::SerializationError(format!("off-chain message too long: {} bytes", message.len()))
    })?;
    let mut out = Vec::with_capacity(OFFCHAIN_SIGNING_DOMAIN.len() + 4 + message.len());
    out.extend_from_slice(OFFCHAIN_SIGNING_DOMAIN);
    out.push(OFFCHAIN_VERSION);
    out.push(format_of(message) as u8);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(message);
    Ok(out)
}

pub fn sign_bytes(bytes: &[u8], private_key: &[u8]) -> Result<[u8; 64], SolError> {
    Ok(signing_key(private_key)?.sign(bytes).to_bytes())
}

/// Strict Ed25519 verification against the key encoded in `address`.
///
/// Malformed addresses or signatures verify as `false`.
pub fn verify_bytes(address: &str, bytes: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = address_to_bytes(address) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify_strict(bytes, &signature).is_ok()
}
