//! Account ids and keys.
//!
//! Implicit accounts are the lowercase hex of an Ed25519 public key. Named
//! accounts are 2 to 64 characters of `[a-z0-9]` separated by single `-`,
//! `_` or `.` characters.

use ed25519_dalek::SigningKey;
use zeroize::Zeroizing;

use crate::error::NearError;

const MIN_ACCOUNT_LEN: usize = 2;
const MAX_ACCOUNT_LEN: usize = 64;

/// Key type tag in `ed25519:<base58>` strings and borsh encodings.
pub const ED25519_PREFIX: &str = "ed25519:";

pub fn implicit_account(public_key: &[u8]) -> Result<String, NearError> {
    let key: [u8; 32] = public_key.try_into().map_err(|_| {
        NearError::InvalidPublicKey(format!("expected 32 bytes, got {}", public_key.len()))
    })?;
    Ok(hex::encode(key))
}

/// Public key behind an implicit account, if `account_id` is one.
pub fn implicit_public_key(account_id: &str) -> Option<[u8; 32]> {
    if account_id.len() != 64 || account_id.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    hex::decode(account_id).ok()?.try_into().ok()
}

pub fn is_valid_account_id(account_id: &str) -> bool {
    if !(MIN_ACCOUNT_LEN..=MAX_ACCOUNT_LEN).contains(&account_id.len()) {
        return false;
    }
    let mut prev_separator = true;
    for c in account_id.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_separator = false,
            '-' | '_' | '.' if !prev_separator => prev_separator = true,
            _ => return false,
        }
    }
    !prev_separator
}

pub fn validate_account_id(account_id: &str) -> Result<(), NearError> {
    if is_valid_account_id(account_id) {
        Ok(())
    } else {
        Err(NearError::InvalidAccountId(account_id.to_string()))
    }
}

pub fn signing_key(private_key: &[u8]) -> Result<SigningKey, NearError> {
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(private_key.try_into().map_err(|_| {
        NearError::InvalidPrivateKey(format!("expected 32-byte seed, got {} bytes", private_key.len()))
    })?);
    Ok(SigningKey::from_bytes(&seed))
}

pub fn public_key_from_private(private_key: &[u8]) -> Result<[u8; 32], NearError> {
    Ok(signing_key(private_key)?.verifying_key().to_bytes())
}

/// `ed25519:<base58>` form used by the RPC.
pub fn encode_public_key(public_key: &[u8; 32]) -> String {
    format!("{ED25519_PREFIX}{}", bs58::encode(public_key).into_string())
}

pub fn decode_public_key(encoded: &str) -> Result<[u8; 32], NearError> {
    let body = encoded
        .strip_prefix(ED25519_PREFIX)
        .ok_or_else(|| NearError::InvalidPublicKey(format!("unsupported key type in {encoded}")))?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| NearError::InvalidPublicKey(e.to_string()))?
        .try_into()
        .map_err(|v: Vec<u8>| NearError::InvalidPublicKey(format!("expected 32 bytes, got {}", v.len())))
}
