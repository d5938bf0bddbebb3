//! Off-chain message signing and verification.
//!
//! EVM signatures are 65-byte recoverable secp256k1 signatures checked by
//! recovering the signer. Solana and NEAR signatures are ed25519, checked
//! against the public key encoded in the address (NEAR: implicit accounts
//! only). Bitcoin and Ripple message signing is not offered.

use std::collections::HashSet;

use chain_api::{Chain, ChainError, ChainFamily, MessageEncoding, SignableMessage, SignatureWithSigner};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::WalletError;
use crate::types::normalize_address;

/// Outcome of a single verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    /// The address the signature resolves to, when it resolves at all.
    pub recovered_address: Option<String>,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            recovered_address: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageSigner;

impl MessageSigner {
    pub fn sign(
        &self,
        chain: Chain,
        message: &SignableMessage,
        encoding: MessageEncoding,
        private_key: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        if encoding == MessageEncoding::RawDigest {
            warn!(%chain, "signing a raw digest; prefer personal or typed-data encoding");
        }
        match chain.family() {
            ChainFamily::Evm => {
                let digest = evm_digest(message, encoding)?;
                let signature = chain_eth::message::sign_digest(&digest, private_key)
                    .map_err(ChainError::from)?;
                Ok(signature.to_vec())
            }
            ChainFamily::Solana => {
                let bytes = solana_bytes(message, encoding)?;
                let signature =
                    chain_sol::message::sign_bytes(&bytes, private_key).map_err(ChainError::from)?;
                Ok(signature.to_vec())
            }
            ChainFamily::Near => {
                let bytes = near_bytes(message, encoding)?;
                let signature =
                    chain_near::message::sign_bytes(&bytes, private_key).map_err(ChainError::from)?;
                Ok(signature.to_vec())
            }
            ChainFamily::Bitcoin | ChainFamily::Ripple => Err(unsupported(chain)),
        }
    }

    /// Checks `signature` against `expected_address`. Malformed signatures
    /// verify as invalid; malformed messages are errors.
    pub fn verify(
        &self,
        chain: Chain,
        message: &SignableMessage,
        signature: &[u8],
        expected_address: &str,
        encoding: MessageEncoding,
    ) -> Result<Verification, WalletError> {
        match chain.family() {
            ChainFamily::Evm => {
                let digest = evm_digest(message, encoding)?;
                let Ok(recovered) = chain_eth::message::recover_address(&digest, signature) else {
                    return Ok(Verification::invalid());
                };
                let recovered = chain_eth::address::checksum(&recovered);
                Ok(Verification {
                    valid: recovered.eq_ignore_ascii_case(expected_address),
                    recovered_address: Some(recovered),
                })
            }
            ChainFamily::Solana => {
                let bytes = solana_bytes(message, encoding)?;
                let valid = chain_sol::message::verify_bytes(expected_address, &bytes, signature);
                Ok(resolved(valid, expected_address))
            }
            ChainFamily::Near => {
                let bytes = near_bytes(message, encoding)?;
                let public_key =
                    chain_near::account::implicit_public_key(expected_address).ok_or_else(|| {
                        WalletError::UnsupportedOperation(format!(
                            "{expected_address}: only implicit NEAR accounts verify offline"
                        ))
                    })?;
                let valid = chain_near::message::verify_bytes(&public_key, &bytes, signature);
                Ok(resolved(valid, expected_address))
            }
            ChainFamily::Bitcoin | ChainFamily::Ripple => Err(unsupported(chain)),
        }
    }
}

/// ed25519 resolves to the expected key or to nothing.
fn resolved(valid: bool, address: &str) -> Verification {
    Verification {
        valid,
        recovered_address: valid.then(|| address.to_string()),
    }
}

fn unsupported(chain: Chain) -> WalletError {
    WalletError::UnsupportedOperation(format!("{chain}: message signing"))
}

fn raw_digest(bytes: &[u8]) -> Result<[u8; 32], WalletError> {
    bytes.try_into().map_err(|_| {
        WalletError::InvalidSignature(format!("raw digest must be 32 bytes, got {}", bytes.len()))
    })
}

fn mismatch(encoding: MessageEncoding) -> WalletError {
    WalletError::UnsupportedOperation(format!("message shape does not match {encoding:?} encoding"))
}

fn evm_digest(message: &SignableMessage, encoding: MessageEncoding) -> Result<[u8; 32], WalletError> {
    match (encoding, message) {
        (MessageEncoding::Personal, SignableMessage::Bytes(bytes)) => {
            Ok(chain_eth::message::personal_message_hash(bytes))
        }
        (MessageEncoding::RawDigest, SignableMessage::Bytes(bytes)) => raw_digest(bytes),
        (MessageEncoding::StructuredTypedData, SignableMessage::TypedData(value)) => {
            Ok(chain_eth::typed_data::hash_typed_data(value).map_err(ChainError::from)?)
        }
        _ => Err(mismatch(encoding)),
    }
}

fn solana_bytes(message: &SignableMessage, encoding: MessageEncoding) -> Result<Vec<u8>, WalletError> {
    match (encoding, message) {
        (MessageEncoding::Personal, SignableMessage::Bytes(bytes)) => {
            Ok(chain_sol::message::offchain_message(bytes).map_err(ChainError::from)?)
        }
        (MessageEncoding::RawDigest, SignableMessage::Bytes(bytes)) => Ok(raw_digest(bytes)?.to_vec()),
        (MessageEncoding::StructuredTypedData, _) => Err(WalletError::UnsupportedOperation(
            "typed data signing is EVM only".into(),
        )),
        _ => Err(mismatch(encoding)),
    }
}

fn near_bytes(message: &SignableMessage, encoding: MessageEncoding) -> Result<Vec<u8>, WalletError> {
    match (encoding, message) {
        (MessageEncoding::Personal, SignableMessage::Bytes(bytes)) => {
            Ok(chain_near::message::personal_message_hash(bytes).to_vec())
        }
        (MessageEncoding::RawDigest, SignableMessage::Bytes(bytes)) => Ok(raw_digest(bytes)?.to_vec()),
        (MessageEncoding::StructuredTypedData, _) => Err(WalletError::UnsupportedOperation(
            "typed data signing is EVM only".into(),
        )),
        _ => Err(mismatch(encoding)),
    }
}

/// Partition of a signature set checked against a required-signer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdVerification {
    /// Every required signer signed and the valid count reaches the threshold.
    pub valid: bool,
    pub valid_signatures: Vec<SignatureWithSigner>,
    pub invalid_signatures: Vec<SignatureWithSigner>,
    pub missing_required: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MultiSigner {
    signer: MessageSigner,
}

impl MultiSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each required signer counts at most once. Signatures from outside the
    /// required set, repeats and failed verifications land in the invalid
    /// partition.
    pub fn verify_threshold(
        &self,
        chain: Chain,
        message: &SignableMessage,
        signatures: &[SignatureWithSigner],
        required_signers: &[String],
        threshold: u32,
        encoding: MessageEncoding,
    ) -> Result<ThresholdVerification, WalletError> {
        let required: HashSet<String> = required_signers
            .iter()
            .map(|s| normalize_address(chain, s))
            .collect();
        let mut counted = HashSet::new();
        let mut valid_signatures = Vec::new();
        let mut invalid_signatures = Vec::new();

        for entry in signatures {
            let key = normalize_address(chain, &entry.signer);
            let accepted = required.contains(&key)
                && !counted.contains(&key)
                && self
                    .signer
                    .verify(chain, message, &entry.signature, &entry.signer, encoding)?
                    .valid;
            if accepted {
                counted.insert(key);
                valid_signatures.push(entry.clone());
            } else {
                debug!(%chain, signer = %entry.signer, "signature not counted");
                invalid_signatures.push(entry.clone());
            }
        }

        let mut reported = HashSet::new();
        let missing_required: Vec<String> = required_signers
            .iter()
            .filter(|s| {
                let key = normalize_address(chain, s);
                !counted.contains(&key) && reported.insert(key)
            })
            .cloned()
            .collect();

        let valid = missing_required.is_empty() && valid_signatures.len() >= threshold as usize;
        Ok(ThresholdVerification {
            valid,
            valid_signatures,
            invalid_signatures,
            missing_required,
        })
    }
}
