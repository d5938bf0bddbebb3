//! Safe (Gnosis Safe) multisig support: owner/threshold reads, the EIP-712
//! `SafeTx` approval message and `execTransaction` calldata.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::abi::{encode_call, AbiParam};
use crate::address::checksum;
use crate::error::EthError;
use crate::typed_data::hash_typed_data;

const EXEC_TRANSACTION: &str = "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)";

/// Operation 0 is `CALL`; delegate calls are never proposed.
pub const OPERATION_CALL: u8 = 0;

/// Fields of a Safe transaction, as hashed under EIP-712.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeTx {
    pub to: Address,
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    pub operation: u8,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
}

impl SafeTx {
    /// A plain call with no gas refund.
    pub fn call(to: Address, value: U256, data: Bytes, nonce: U256) -> Self {
        Self {
            to,
            value,
            data,
            operation: OPERATION_CALL,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }
}

/// The multisig payload handed around by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeProposal {
    pub chain_id: u64,
    pub safe: Address,
    pub tx: SafeTx,
}

impl SafeProposal {
    /// EIP-712 JSON that owners sign.
    pub fn typed_data(&self) -> Value {
        let tx = &self.tx;
        json!({
            "types": {
                "EIP712Domain": [
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "SafeTx": [
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint256"},
                    {"name": "data", "type": "bytes"},
                    {"name": "operation", "type": "uint8"},
                    {"name": "safeTxGas", "type": "uint256"},
                    {"name": "baseGas", "type": "uint256"},
                    {"name": "gasPrice", "type": "uint256"},
                    {"name": "gasToken", "type": "address"},
                    {"name": "refundReceiver", "type": "address"},
                    {"name": "nonce", "type": "uint256"}
                ]
            },
            "primaryType": "SafeTx",
            "domain": {
                "chainId": self.chain_id,
                "verifyingContract": checksum(&self.safe),
            },
            "message": {
                "to": checksum(&tx.to),
                "value": tx.value.to_string(),
                "data": format!("0x{}", hex::encode(&tx.data)),
                "operation": tx.operation,
                "safeTxGas": tx.safe_tx_gas.to_string(),
                "baseGas": tx.base_gas.to_string(),
                "gasPrice": tx.gas_price.to_string(),
                "gasToken": checksum(&tx.gas_token),
                "refundReceiver": checksum(&tx.refund_receiver),
                "nonce": tx.nonce.to_string(),
            }
        })
    }

    pub fn safe_tx_hash(&self) -> Result<[u8; 32], EthError> {
        hash_typed_data(&self.typed_data())
    }
}

pub fn encode_get_owners() -> Vec<u8> {
    encode_call("getOwners()", &[])
}

pub fn encode_get_threshold() -> Vec<u8> {
    encode_call("getThreshold()", &[])
}

pub fn encode_nonce() -> Vec<u8> {
    encode_call("nonce()", &[])
}

/// Concatenates 65-byte owner signatures sorted by owner address, the order
/// `checkSignatures` requires.
pub fn pack_signatures(mut approvals: Vec<(Address, Vec<u8>)>) -> Result<Vec<u8>, EthError> {
    approvals.sort_by(|a, b| a.0.cmp(&b.0));
    let mut packed = Vec::with_capacity(approvals.len() * 65);
    for (owner, signature) in approvals {
        if signature.len() != 65 {
            return Err(EthError::SigningError(format!(
                "signature from {} is {} bytes, expected 65",
                checksum(&owner),
                signature.len()
            )));
        }
        packed.extend_from_slice(&signature);
    }
    Ok(packed)
}

pub fn encode_exec_transaction(tx: &SafeTx, signatures: Vec<u8>) -> Vec<u8> {
    encode_call(
        EXEC_TRANSACTION,
        &[
            AbiParam::Address(tx.to),
            AbiParam::Uint(tx.value),
            AbiParam::Bytes(tx.data.to_vec()),
            AbiParam::Uint(U256::from(tx.operation)),
            AbiParam::Uint(tx.safe_tx_gas),
            AbiParam::Uint(tx.base_gas),
            AbiParam::Uint(tx.gas_price),
            AbiParam::Address(tx.gas_token),
            AbiParam::Address(tx.refund_receiver),
            AbiParam::Bytes(signatures),
        ],
    )
}
