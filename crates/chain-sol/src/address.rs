//! Solana address derivation and validation.
//!
//! Solana addresses are Base58-encoded 32-byte Ed25519 public keys. There is
//! no hashing step.

use ed25519_dalek::SigningKey;
use zeroize::Zeroizing;

use crate::error::SolError;

/// Solana address of a 32-byte Ed25519 public key.
pub fn public_key_to_address(public_key: &[u8]) -> Result<String, SolError> {
    let bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        SolError::InvalidPublicKey(format!("expected 32 bytes, got {}", public_key.len()))
    })?;
    Ok(bytes_to_address(&bytes))
}

/// Ed25519 signing key from a 32-byte seed.
pub fn signing_key(private_key: &[u8]) -> Result<SigningKey, SolError> {
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(private_key.try_into().map_err(|_| {
        SolError::InvalidPrivateKey(format!("expected 32-byte seed, got {} bytes", private_key.len()))
    })?);
    Ok(SigningKey::from_bytes(&seed))
}

pub fn public_key_from_private(private_key: &[u8]) -> Result<[u8; 32], SolError> {
    Ok(signing_key(private_key)?.verifying_key().to_bytes())
}

/// Whether `address` decodes to exactly 32 bytes.
pub fn is_valid_address(address: &str) -> bool {
    address_to_bytes(address).is_ok()
}

/// Decode a Solana address string to its 32-byte representation.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })
}

pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}
