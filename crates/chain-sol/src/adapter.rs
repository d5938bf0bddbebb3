use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chain_api::{
    parse_base_units, retry_read, Chain, ChainAdapter, ChainError, ChainFamily, NodeTransport,
    RetryPolicy, SignatureWithSigner, TokenStandard, TokenTransfer, TransportError, TxStatus,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::address::{self, address_to_bytes};
use crate::fees::SolFeeEstimator;
use crate::spl_token::{build_create_associated_account, build_spl_transfer, derive_associated_token_address};
use crate::transaction::{
    build_sol_transfer, compile_transaction, sign_wire_transaction, transaction_id, unsigned_wire,
};

/// Default public RPC endpoints.
pub const MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";
pub const DEVNET_RPC: &str = "https://api.devnet.solana.com";

const COMMITMENT: &str = "confirmed";

/// Chain adapter for Solana.
///
/// Payloads are wire transactions with zeroed signature slots; the recent
/// blockhash embedded in the message is the ordering token.
pub struct SolAdapter {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    retry: RetryPolicy,
}

impl SolAdapter {
    pub fn new(chain: Chain, transport: Arc<dyn NodeTransport>, retry: RetryPolicy) -> Result<Self, ChainError> {
        if chain.family() != ChainFamily::Solana {
            return Err(ChainError::UnsupportedChain(format!("{chain} is not a solana cluster")));
        }
        Ok(Self { chain, transport, retry })
    }

    pub fn fee_estimator(&self) -> SolFeeEstimator {
        SolFeeEstimator::new(self.chain, self.transport.clone(), self.retry)
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

    async fn latest_blockhash(&self) -> Result<[u8; 32], ChainError> {
        let result = self
            .read("getLatestBlockhash", json!([{"commitment": COMMITMENT}]))
            .await?;
        let hash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| ChainError::Decode("getLatestBlockhash: missing blockhash".into()))?;
        let bytes = address_to_bytes(hash)
            .map_err(|e| ChainError::Decode(format!("getLatestBlockhash: {e}")))?;
        debug!(chain = %self.chain, blockhash = hash, "fetched recent blockhash");
        Ok(bytes)
    }

    fn amount_u64(value: &str) -> Result<u64, ChainError> {
        let amount = parse_base_units(value)?;
        u64::try_from(amount).map_err(|_| ChainError::InvalidAmount(format!("{value} exceeds u64")))
    }
}

#[async_trait]
impl ChainAdapter for SolAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        Ok(address::public_key_to_address(public_key)?)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::is_valid_address(address)
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(address::public_key_from_private(private_key)?.to_vec())
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        address_to_bytes(address)?;
        let result = self
            .read("getBalance", json!([address, {"commitment": COMMITMENT}]))
            .await?;
        let lamports = result["value"]
            .as_u64()
            .ok_or_else(|| ChainError::Decode("getBalance: missing value".into()))?;
        Ok(lamports.to_string())
    }

    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError> {
        let owner = address_to_bytes(address)?;
        let mint = address_to_bytes(token)?;
        let ata = address::bytes_to_address(&derive_associated_token_address(&owner, &mint)?);

        let result = retry_read(&self.retry, "getTokenAccountBalance", || async {
            match self
                .transport
                .rpc("getTokenAccountBalance", json!([ata, {"commitment": COMMITMENT}]))
                .await
            {
                // No associated account means no tokens.
                Err(TransportError::Rpc { message, .. }) if message.contains("could not find account") => {
                    Ok(Value::Null)
                }
                other => other.map_err(ChainError::from),
            }
        })
        .await?;
        if result.is_null() {
            return Ok("0".into());
        }
        result["value"]["amount"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Decode("getTokenAccountBalance: missing amount".into()))
    }

    async fn propose_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        if data.is_some_and(|d| !d.is_empty()) {
            return Err(ChainError::Unsupported(format!("{}: call data", self.chain)));
        }
        let from = address_to_bytes(wallet)?;
        let to = address_to_bytes(to)?;
        let lamports = Self::amount_u64(value)?;
        let blockhash = self.latest_blockhash().await?;
        let tx = build_sol_transfer(&from, &to, lamports, &blockhash)?;
        Ok(unsigned_wire(&tx)?)
    }

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        transfer.validate()?;
        let amount = match transfer.standard {
            TokenStandard::Fungible | TokenStandard::SemiFungible => {
                Self::amount_u64(transfer.amount.as_deref().unwrap_or_default())?
            }
            // The mint is the NFT; exactly one unit moves.
            TokenStandard::NonFungible => 1,
            TokenStandard::Partitioned => {
                return Err(ChainError::Unsupported(format!(
                    "{}: partitioned tokens",
                    self.chain
                )))
            }
        };
        let owner = address_to_bytes(wallet)?;
        let recipient = address_to_bytes(&transfer.to)?;
        let mint = address_to_bytes(&transfer.token)?;

        let source = derive_associated_token_address(&owner, &mint)?;
        let destination = derive_associated_token_address(&recipient, &mint)?;
        let instructions = [
            build_create_associated_account(&owner, &recipient, &mint)?,
            build_spl_transfer(&source, &destination, &owner, amount)?,
        ];
        let blockhash = self.latest_blockhash().await?;
        let tx = compile_transaction(&instructions, &owner, &blockhash)?;
        Ok(unsigned_wire(&tx)?)
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(sign_wire_transaction(private_key, payload)?)
    }

    async fn execute_transaction(
        &self,
        wallet: &str,
        signed_payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError> {
        if !signatures.is_empty() {
            return Err(ChainError::Unsupported(format!("{}: multisig", self.chain)));
        }
        transaction_id(signed_payload)?;
        let result = self
            .transport
            .rpc(
                "sendTransaction",
                json!([BASE64.encode(signed_payload), {"encoding": "base64", "preflightCommitment": COMMITMENT}]),
            )
            .await
            .map_err(|err| {
                error!(chain = %self.chain, wallet, error = %err, "broadcast rejected");
                err.into_broadcast_error()
            })?;
        let signature = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("sendTransaction: expected a signature".into()))?;
        info!(chain = %self.chain, wallet, tx_hash = signature, payload_len = signed_payload.len(), "transaction broadcast");
        Ok(signature.to_string())
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let result = self
            .read(
                "getSignatureStatuses",
                json!([[tx_hash], {"searchTransactionHistory": true}]),
            )
            .await?;
        let status = &result["value"][0];
        if status.is_null() {
            return Ok(TxStatus::Pending);
        }
        if !status["err"].is_null() {
            return Ok(TxStatus::Failed);
        }
        match status["confirmationStatus"].as_str() {
            Some("confirmed") | Some("finalized") => Ok(TxStatus::Confirmed),
            _ => Ok(TxStatus::Pending),
        }
    }
}
