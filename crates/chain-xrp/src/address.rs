use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::XrpError;

/// Version byte of a classic account address.
const ACCOUNT_ID_VERSION: u8 = 0x00;

pub type AccountId = [u8; 20];

/// RIPEMD160(SHA256(pubkey)) of a compressed secp256k1 key.
pub fn account_id_from_public_key(public_key: &[u8]) -> Result<AccountId, XrpError> {
    let key = PublicKey::from_sec1_bytes(public_key)
        .map_err(|e| XrpError::InvalidPublicKey(format!("invalid sec1 encoding: {e}")))?;
    let compressed = key.to_encoded_point(true);
    Ok(Ripemd160::digest(Sha256::digest(compressed.as_bytes())).into())
}

pub fn encode_address(account_id: &AccountId) -> String {
    bs58::encode(account_id)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check_version(ACCOUNT_ID_VERSION)
        .into_string()
}

pub fn decode_address(address: &str) -> Result<AccountId, XrpError> {
    if !address.starts_with('r') {
        return Err(XrpError::InvalidAddress(address.to_string()));
    }
    let decoded = bs58::decode(address)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check(Some(ACCOUNT_ID_VERSION))
        .into_vec()
        .map_err(|e| XrpError::InvalidAddress(format!("{address}: {e}")))?;
    // Version byte stays in front of the payload.
    decoded
        .get(1..)
        .and_then(|id| AccountId::try_from(id).ok())
        .ok_or_else(|| XrpError::InvalidAddress(format!("{address}: expected 20-byte account id")))
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

pub fn address_from_public_key(public_key: &[u8]) -> Result<String, XrpError> {
    Ok(encode_address(&account_id_from_public_key(public_key)?))
}

pub fn signing_key(private_key: &[u8]) -> Result<SigningKey, XrpError> {
    SigningKey::from_slice(private_key).map_err(|e| XrpError::InvalidPrivateKey(e.to_string()))
}

/// Compressed (33-byte) public key.
pub fn public_key_from_private(private_key: &[u8]) -> Result<Vec<u8>, XrpError> {
    Ok(signing_key(private_key)?
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec())
}
