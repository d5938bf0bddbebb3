use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::EthError;
use crate::message::sign_digest;

/// Gas limit of a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// An unsigned EIP-1559 (type 2) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    /// Value in wei.
    pub value: U256,
    /// Calldata (empty for plain transfers).
    #[serde(default)]
    pub data: Bytes,
}

/// A signed EIP-1559 transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedEthTransaction {
    /// `0x02 || rlp(signed fields)`.
    pub raw_tx: Vec<u8>,
    /// 0x-prefixed keccak256 of `raw_tx`.
    pub tx_hash: String,
}

/// An EIP-2930 access list entry (always empty here).
#[derive(Debug, Clone, RlpEncodable)]
struct AccessListItem {
    address: Address,
    storage_keys: Vec<B256>,
}

#[derive(RlpEncodable)]
struct UnsignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

#[derive(RlpEncodable)]
struct SignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
    signature_y_parity: u8,
    signature_r: U256,
    signature_s: U256,
}

fn typed_envelope(fields: &impl Encodable) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + fields.length());
    out.push(0x02);
    fields.encode(&mut out);
    out
}

impl EthTransaction {
    /// `0x02 || rlp([chain_id, nonce, tip, max_fee, gas, to, value, data, []])`.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        typed_envelope(&UnsignedTxFields {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            access_list: Vec::new(),
        })
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        Keccak256::digest(self.encode_unsigned()).into()
    }

    pub fn validate(&self) -> Result<(), EthError> {
        if self.max_priority_fee_per_gas > self.max_fee_per_gas {
            return Err(EthError::TransactionBuildError(
                "priority fee exceeds max fee".into(),
            ));
        }
        if self.gas_limit < TRANSFER_GAS {
            return Err(EthError::TransactionBuildError(format!(
                "gas limit {} below intrinsic {TRANSFER_GAS}",
                self.gas_limit
            )));
        }
        Ok(())
    }
}

/// Signs an EIP-1559 transaction with a secp256k1 private key.
pub fn sign_transaction(
    tx: &EthTransaction,
    private_key: &[u8],
) -> Result<SignedEthTransaction, EthError> {
    tx.validate()?;
    let signature = sign_digest(&tx.signing_hash(), private_key)?;

    let raw_tx = typed_envelope(&SignedTxFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_gas: tx.max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        access_list: Vec::new(),
        signature_y_parity: signature[64] - 27,
        signature_r: U256::from_be_slice(&signature[..32]),
        signature_s: U256::from_be_slice(&signature[32..64]),
    });

    let tx_hash = format!("0x{}", hex::encode(Keccak256::digest(&raw_tx)));
    Ok(SignedEthTransaction { raw_tx, tx_hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::address_from_private_key;
    use crate::message::recover_address;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    }

    fn sample_tx() -> EthTransaction {
        EthTransaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 30_000_000_000,
            gas_limit: TRANSFER_GAS,
            to: Address::repeat_byte(0x35),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::new(),
        }
    }

    #[test]
    fn unsigned_encoding_starts_with_type_byte_and_list() {
        let encoded = sample_tx().encode_unsigned();
        assert_eq!(encoded[0], 0x02);
        assert!(encoded[1] >= 0xc0, "payload after type byte is an RLP list");
    }

    #[test]
    fn unsigned_encoding_known_prefix() {
        let mut tx = sample_tx();
        tx.value = U256::ZERO;
        tx.max_priority_fee_per_gas = 0;
        tx.max_fee_per_gas = 0;
        let encoded = tx.encode_unsigned();
        // [1, 0, 0, 0, 21000, to, 0, "", []]
        let mut expected = vec![0x02, 0xdf, 0x01, 0x80, 0x80, 0x80, 0x82, 0x52, 0x08, 0x94];
        expected.extend_from_slice(&[0x35; 20]);
        expected.extend_from_slice(&[0x80, 0x80, 0xc0]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn signature_recovers_sender() {
        let tx = sample_tx();
        let signed = sign_transaction(&tx, &test_key()).unwrap();
        assert_eq!(signed.raw_tx[0], 0x02);
        assert!(signed.tx_hash.starts_with("0x"));
        assert_eq!(signed.tx_hash.len(), 66);

        let sig = sign_digest(&tx.signing_hash(), &test_key()).unwrap();
        let sender = recover_address(&tx.signing_hash(), &sig).unwrap();
        assert_eq!(sender, address_from_private_key(&test_key()).unwrap());
        // s is the last field of the signed envelope
        let s_start = sig[32..64].iter().position(|b| *b != 0).unwrap_or(32);
        assert!(signed.raw_tx.ends_with(&sig[32 + s_start..64]));
    }

    #[test]
    fn signing_is_deterministic_and_nonce_sensitive() {
        let tx = sample_tx();
        let a = sign_transaction(&tx, &test_key()).unwrap();
        let b = sign_transaction(&tx, &test_key()).unwrap();
        assert_eq!(a.raw_tx, b.raw_tx);

        let mut bumped = tx.clone();
        bumped.nonce = 1;
        let c = sign_transaction(&bumped, &test_key()).unwrap();
        assert_ne!(a.tx_hash, c.tx_hash);
    }

    #[test]
    fn chain_id_changes_signing_hash() {
        let mut other = sample_tx();
        other.chain_id = 137;
        assert_ne!(sample_tx().signing_hash(), other.signing_hash());
    }

    #[test]
    fn invalid_key_and_fees_rejected() {
        assert!(matches!(
            sign_transaction(&sample_tx(), &[0u8; 32]),
            Err(EthError::InvalidPrivateKey(_))
        ));
        let mut tx = sample_tx();
        tx.max_priority_fee_per_gas = tx.max_fee_per_gas + 1;
        assert!(matches!(
            sign_transaction(&tx, &test_key()),
            Err(EthError::TransactionBuildError(_))
        ));
    }

    #[test]
    fn json_roundtrip() {
        let tx = sample_tx();
        let json = serde_json::to_vec(&tx).unwrap();
        let back: EthTransaction = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, tx);
    }
}
