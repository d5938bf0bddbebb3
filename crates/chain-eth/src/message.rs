//! Off-chain message hashing, signing and recovery (EIP-191 / raw digests).

use alloy_primitives::Address;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::address::address_from_public_key;
use crate::error::EthError;

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Signs a 32-byte digest. Returns `r || s || v` with `v` in {27, 28}.
pub fn sign_digest(digest: &[u8; 32], private_key: &[u8]) -> Result<[u8; 65], EthError> {
    let signing_key = SigningKey::from_slice(private_key)
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()))?;
    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash(digest)
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = recovery_id.to_byte() + 27;
    Ok(out)
}

/// Recovers the signer address of a 65-byte `r || s || v` signature.
///
/// Accepts `v` as 0/1 or 27/28. High-S signatures are rejected.
pub fn recover_address(digest: &[u8; 32], signature: &[u8]) -> Result<Address, EthError> {
    if signature.len() != 65 {
        return Err(EthError::SigningError(format!(
            "expected 65-byte signature, got {}",
            signature.len()
        )));
    }
    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(EthError::SigningError(format!("invalid recovery byte {other}")));
        }
    };
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| EthError::SigningError(e.to_string()))?;
    if sig.normalize_s().is_some() {
        return Err(EthError::SigningError("non-canonical high-s signature".into()));
    }
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| EthError::SigningError("invalid recovery id".into()))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| EthError::SigningError(e.to_string()))?;
    address_from_public_key(key.to_encoded_point(false).as_bytes())
}
