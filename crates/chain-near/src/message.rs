//! Off-chain message signing.
//!
//! Personal messages are prefixed with the NEP-413 tag (`2^31 + 413`,
//! little-endian) ahead of the borsh-encoded message, then hashed with
//! SHA-256. The tag is not a valid borsh string length for any real
//! transaction, so a signed message can never be replayed as one.

use ed25519_dalek::{Signature, Signer, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::NearError;

pub const NEP413_TAG: u32 = (1 << 31) + 413;

pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(NEP413_TAG.to_le_bytes());
    hasher.update((message.len() as u32).to_le_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

pub fn sign_bytes(bytes: &[u8], private_key: &[u8]) -> Result<[u8; 64], NearError> {
    Ok(crate::account::signing_key(private_key)?.sign(bytes).to_bytes())
}

/// Strict ed25519 verification. Malformed keys or signatures yield `false`.
pub fn verify_bytes(public_key: &[u8], bytes: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(&key) else {
        return false;
    };
    vk.verify_strict(bytes, &Signature::from_bytes(&sig)).is_ok()
}
