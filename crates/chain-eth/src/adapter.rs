use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use chain_api::error::is_insufficient_funds;
use chain_api::{
    retry_read, ApprovalRequest, Chain, ChainAdapter, ChainError, ChainFamily, FeePriority,
    MessageEncoding, MultisigConfig, NodeTransport, RetryPolicy, SignableMessage,
    SignatureWithSigner, TokenTransfer, TransportError, TxStatus,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::abi::{decode_address_array, decode_uint};
use crate::address::{self, checksum, parse_address};
use crate::fees::EvmFeeEstimator;
use crate::rpc::{data_bytes, data_hex, quantity, quantity_u256, quantity_u64};
use crate::safe::{self, SafeProposal, SafeTx};
use crate::tokens::{encode_balance_of, encode_token_transfer, parse_amount};
use crate::transaction::{sign_transaction, EthTransaction, TRANSFER_GAS};

/// Headroom added to `eth_estimateGas` for contract calls, in percent.
const GAS_MARGIN_PERCENT: u64 = 20;

/// Chain adapter for EVM networks.
///
/// Unsigned payloads are JSON-encoded [`EthTransaction`]s; signed payloads
/// are raw EIP-1559 envelopes. Multisig payloads are JSON [`SafeProposal`]s
/// executed through a relayer account the node manages.
pub struct EvmAdapter {
    chain: Chain,
    chain_id: u64,
    transport: Arc<dyn NodeTransport>,
    fees: EvmFeeEstimator,
    retry: RetryPolicy,
    relayer: Option<Address>,
}

impl EvmAdapter {
    pub fn new(
        chain: Chain,
        transport: Arc<dyn NodeTransport>,
        retry: RetryPolicy,
    ) -> Result<Self, ChainError> {
        let chain_id = match (chain.family(), chain.evm_chain_id()) {
            (ChainFamily::Evm, Some(id)) => id,
            _ => return Err(ChainError::UnsupportedChain(format!("{chain} is not an EVM chain"))),
        };
        Ok(Self {
            chain,
            chain_id,
            fees: EvmFeeEstimator::new(chain, transport.clone(), retry),
            transport,
            retry,
            relayer: None,
        })
    }

    /// Account that submits `execTransaction` for Safe proposals.
    pub fn with_relayer(mut self, relayer: &str) -> Result<Self, ChainError> {
        self.relayer = Some(parse_address(relayer)?);
        Ok(self)
    }

    async fn read(&self, method: &'static str, params: Value) -> Result<Value, ChainError> {
        retry_read(&self.retry, method, || async {
            self.transport
                .rpc(method, params.clone())
                .await
                .map_err(ChainError::from)
        })
        .await
    }

    async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let result = self
            .read(
                "eth_call",
                json!([{"to": checksum(&to), "data": data_hex(data)}, "latest"]),
            )
            .await?;
        data_bytes(&result, "eth_call")
    }

    async fn pending_nonce(&self, from: Address) -> Result<u64, ChainError> {
        let result = self
            .read(
                "eth_getTransactionCount",
                json!([checksum(&from), "pending"]),
            )
            .await?;
        quantity_u64(&result, "eth_getTransactionCount")
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<u64, ChainError> {
        let call = json!({
            "from": checksum(&from),
            "to": checksum(&to),
            "value": quantity(value),
            "data": data_hex(data),
        });
        let estimate = self
            .transport
            .rpc("eth_estimateGas", json!([call]))
            .await
            .map_err(|err| match err {
                TransportError::Rpc { message, .. } if is_insufficient_funds(&message) => {
                    ChainError::InsufficientFunds(message)
                }
                TransportError::Rpc { message, .. } => ChainError::Build(message),
                other => other.into(),
            })?;
        let gas = quantity_u64(&estimate, "eth_estimateGas")?;
        if data.is_empty() {
            Ok(gas.max(TRANSFER_GAS))
        } else {
            Ok(gas + gas * GAS_MARGIN_PERCENT / 100)
        }
    }

    /// Fetches a fresh nonce and fee market and assembles the transaction.
    async fn build_transaction(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Vec<u8>,
    ) -> Result<EthTransaction, ChainError> {
        let nonce = self.pending_nonce(from).await?;
        let market = self.fees.fee_market().await?;
        let (tip, max_fee) = self.fees.eip1559_fees(&market, FeePriority::Medium);
        let gas_limit = self.estimate_gas(from, to, value, &data).await?;

        let tx = EthTransaction {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: tip,
            max_fee_per_gas: max_fee,
            gas_limit,
            to,
            value,
            data: Bytes::from(data),
        };
        debug!(chain = %self.chain, nonce, gas_limit, max_fee, "built evm transaction");
        Ok(tx)
    }

    async fn execute_safe(
        &self,
        wallet: &str,
        payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError> {
        let proposal: SafeProposal = serde_json::from_slice(payload)
            .map_err(|e| ChainError::Decode(format!("safe proposal: {e}")))?;
        if proposal.safe != parse_address(wallet)? {
            return Err(ChainError::Build(format!(
                "proposal targets {} but wallet is {wallet}",
                checksum(&proposal.safe)
            )));
        }
        let relayer = self.relayer.ok_or_else(|| {
            ChainError::Unsupported(format!("{}: no relayer configured for safe execution", self.chain))
        })?;

        let approvals = signatures
            .iter()
            .map(|s| Ok((parse_address(&s.signer)?, s.signature.clone())))
            .collect::<Result<Vec<_>, ChainError>>()?;
        let packed = safe::pack_signatures(approvals)?;
        let calldata = safe::encode_exec_transaction(&proposal.tx, packed);

        let call = json!({
            "from": checksum(&relayer),
            "to": checksum(&proposal.safe),
            "data": data_hex(&calldata),
        });
        let result = self
            .transport
            .rpc("eth_sendTransaction", json!([call]))
            .await
            .map_err(|err| {
                error!(chain = %self.chain, safe = wallet, error = %err, "safe execution rejected");
                err.into_broadcast_error()
            })?;
        let hash = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_sendTransaction: expected a hash".into()))?;
        info!(chain = %self.chain, safe = wallet, tx_hash = hash, signatures = signatures.len(), "safe transaction submitted");
        Ok(hash.to_string())
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        Ok(checksum(&address::address_from_public_key(public_key)?))
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::is_valid_address(address)
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(address::public_key_from_private(private_key)?)
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        let owner = parse_address(address)?;
        let result = self
            .read("eth_getBalance", json!([checksum(&owner), "latest"]))
            .await?;
        Ok(quantity_u256(&result, "eth_getBalance")?.to_string())
    }

    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError> {
        let owner = parse_address(address)?;
        let contract = parse_address(token)?;
        let result = self.eth_call(contract, &encode_balance_of(owner)).await?;
        if result.is_empty() {
            return Ok("0".into());
        }
        Ok(decode_uint(&result, 0)?.to_string())
    }

    async fn propose_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        let from = parse_address(wallet)?;
        let to = parse_address(to)?;
        let value = parse_amount(value)?;
        let tx = self
            .build_transaction(from, to, value, data.unwrap_or_default().to_vec())
            .await?;
        serde_json::to_vec(&tx).map_err(|e| ChainError::Build(e.to_string()))
    }

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        let from = parse_address(wallet)?;
        let (contract, calldata) = encode_token_transfer(from, transfer)?;
        let tx = self
            .build_transaction(from, contract, U256::ZERO, calldata)
            .await?;
        serde_json::to_vec(&tx).map_err(|e| ChainError::Build(e.to_string()))
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        let tx: EthTransaction = serde_json::from_slice(payload)
            .map_err(|e| ChainError::Decode(format!("evm payload: {e}")))?;
        if tx.chain_id != self.chain_id {
            return Err(ChainError::Signing(format!(
                "payload is for chain id {}, adapter is {}",
                tx.chain_id, self.chain_id
            )));
        }
        Ok(sign_transaction(&tx, private_key)?.raw_tx)
    }

    async fn execute_transaction(
        &self,
        wallet: &str,
        signed_payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError> {
        if !signatures.is_empty() {
            return self.execute_safe(wallet, signed_payload, signatures).await;
        }

        let result = self
            .transport
            .rpc("eth_sendRawTransaction", json!([data_hex(signed_payload)]))
            .await
            .map_err(|err| {
                error!(chain = %self.chain, wallet, error = %err, "broadcast rejected");
                err.into_broadcast_error()
            })?;
        let hash = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_sendRawTransaction: expected a hash".into()))?;
        info!(chain = %self.chain, wallet, tx_hash = hash, payload_len = signed_payload.len(), "transaction broadcast");
        Ok(hash.to_string())
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let receipt = self
            .read("eth_getTransactionReceipt", json!([tx_hash]))
            .await;
        let receipt = match receipt {
            Ok(Value::Null) => return Ok(TxStatus::Pending),
            Ok(receipt) => receipt,
            Err(ChainError::Decode(_)) => return Ok(TxStatus::Pending),
            Err(err) => return Err(err),
        };
        match receipt.get("status").and_then(Value::as_str) {
            Some("0x1") => Ok(TxStatus::Confirmed),
            Some("0x0") => Ok(TxStatus::Failed),
            _ => Ok(TxStatus::Pending),
        }
    }

    async fn fetch_multisig_config(&self, reference: &str) -> Result<MultisigConfig, ChainError> {
        let safe = parse_address(reference)?;
        let owners = self.eth_call(safe, &safe::encode_get_owners()).await?;
        if owners.is_empty() {
            return Err(ChainError::Decode(format!("{reference} is not a Safe contract")));
        }
        let owners = decode_address_array(&owners)?;
        let threshold = decode_uint(&self.eth_call(safe, &safe::encode_get_threshold()).await?, 0)?;
        let threshold = u32::try_from(threshold)
            .map_err(|_| ChainError::Decode(format!("threshold {threshold} out of range")))?;
        if threshold == 0 || threshold as usize > owners.len() {
            return Err(ChainError::Decode(format!(
                "safe reports threshold {threshold} for {} owners",
                owners.len()
            )));
        }
        Ok(MultisigConfig {
            signers: owners.iter().map(checksum).collect(),
            threshold,
        })
    }

    async fn propose_multisig_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        let safe_address = parse_address(wallet)?;
        let to = parse_address(to)?;
        let value = parse_amount(value)?;
        let nonce = decode_uint(&self.eth_call(safe_address, &safe::encode_nonce()).await?, 0)?;

        let proposal = SafeProposal {
            chain_id: self.chain_id,
            safe: safe_address,
            tx: SafeTx::call(to, value, Bytes::copy_from_slice(data.unwrap_or_default()), nonce),
        };
        serde_json::to_vec(&proposal).map_err(|e| ChainError::Build(e.to_string()))
    }

    fn approval_message(&self, payload: &[u8]) -> Result<ApprovalRequest, ChainError> {
        let proposal: SafeProposal = serde_json::from_slice(payload)
            .map_err(|e| ChainError::Decode(format!("safe proposal: {e}")))?;
        Ok(ApprovalRequest {
            encoding: MessageEncoding::StructuredTypedData,
            message: SignableMessage::TypedData(proposal.typed_data()),
        })
    }
}
