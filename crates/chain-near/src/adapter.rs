use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chain_api::{
    parse_base_units, retry_read, Chain, ChainAdapter, ChainError, ChainFamily, NodeTransport,
    RetryPolicy, SignatureWithSigner, TokenStandard, TokenTransfer, TransportError, TxStatus,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::account::{
    self, decode_public_key, encode_public_key, implicit_public_key, validate_account_id,
};
use crate::fees::NearFeeEstimator;
use crate::transaction::{self, decode_signed, Action, NearTransaction, ONE_YOCTO, TOKEN_CALL_GAS};

pub const MAINNET_RPC: &str = "https://rpc.mainnet.near.org";
pub const TESTNET_RPC: &str = "https://rpc.testnet.near.org";

const FINALITY: &str = "final";

/// Access key used to sign for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccessKey {
    public_key: [u8; 32],
    nonce: u64,
    block_hash: [u8; 32],
}

/// Chain adapter for NEAR.
///
/// Payloads are borsh transactions. The access-key nonce and the recent
/// block hash together are the ordering token, read fresh per proposal.
pub struct NearAdapter {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    retry: RetryPolicy,
    /// Transaction hash to signer; the `tx` RPC routes by sender shard.
    submitted: Mutex<HashMap<String, String>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_missing_account(err: &TransportError) -> bool {
    matches!(err, TransportError::Rpc { message, .. }
        if message.contains("UNKNOWN_ACCOUNT") || message.contains("does not exist"))
}

impl NearAdapter {
    pub fn new(chain: Chain, transport: Arc<dyn NodeTransport>, retry: RetryPolicy) -> Result<Self, ChainError> {
        if chain.family() != ChainFamily::Near {
            return Err(ChainError::UnsupportedChain(format!("{chain} is not a NEAR network")));
        }
        Ok(Self {
            chain,
            transport,
            retry,
            submitted: Mutex::new(HashMap::new()),
        })
    }

    pub fn fee_estimator(&self) -> NearFeeEstimator {
        NearFeeEstimator::new(self.chain, self.transport.clone(), self.retry)
    }

    /// `query` RPC. Older nodes report view failures inside `result.error`.
    async fn query(&self, request: Value) -> Result<Value, ChainError> {
        let result = retry_read(&self.retry, "query", || async {
            self.transport
                .rpc("query", request.clone())
                .await
                .map_err(ChainError::from)
        })
        .await?;
        if let Some(message) = result["error"].as_str() {
            return Err(ChainError::Transport(format!("query: {message}")));
        }
        Ok(result)
    }

    fn block_hash(result: &Value) -> Result<[u8; 32], ChainError> {
        let encoded = result["block_hash"]
            .as_str()
            .ok_or_else(|| ChainError::Decode("query: missing block_hash".into()))?;
        bs58::decode(encoded)
            .into_vec()
            .ok()
            .and_then(|v| <[u8; 32]>::try_from(v).ok())
            .ok_or_else(|| ChainError::Decode(format!("query: bad block_hash {encoded}")))
    }

    /// Finds the full-access key to sign with. Implicit accounts sign with
    /// the key they are named after; named accounts use their first
    /// full-access key.
    async fn access_key(&self, wallet: &str) -> Result<AccessKey, ChainError> {
        validate_account_id(wallet)?;
        if let Some(public_key) = implicit_public_key(wallet) {
            let result = self
                .query(json!({
                    "request_type": "view_access_key",
                    "finality": FINALITY,
                    "account_id": wallet,
                    "public_key": encode_public_key(&public_key),
                }))
                .await?;
            let nonce = result["nonce"]
                .as_u64()
                .ok_or_else(|| ChainError::Decode("view_access_key: missing nonce".into()))?;
            return Ok(AccessKey {
                public_key,
                nonce,
                block_hash: Self::block_hash(&result)?,
            });
        }

        let result = self
            .query(json!({
                "request_type": "view_access_key_list",
                "finality": FINALITY,
                "account_id": wallet,
            }))
            .await?;
        let keys = result["keys"].as_array().cloned().unwrap_or_default();
        let entry = keys
            .iter()
            .find(|k| k["access_key"]["permission"] == "FullAccess")
            .ok_or_else(|| ChainError::Build(format!("{wallet} has no full-access key")))?;
        let public_key = entry["public_key"]
            .as_str()
            .ok_or_else(|| ChainError::Decode("view_access_key_list: missing public_key".into()))
            .and_then(|s| decode_public_key(s).map_err(ChainError::from))?;
        let nonce = entry["access_key"]["nonce"]
            .as_u64()
            .ok_or_else(|| ChainError::Decode("view_access_key_list: missing nonce".into()))?;
        Ok(AccessKey {
            public_key,
            nonce,
            block_hash: Self::block_hash(&result)?,
        })
    }

    async fn build(&self, wallet: &str, receiver: &str, actions: Vec<Action>) -> Result<Vec<u8>, ChainError> {
        let key = self.access_key(wallet).await?;
        let nonce = key
            .nonce
            .checked_add(1)
            .ok_or_else(|| ChainError::Build("access key nonce overflow".into()))?;
        debug!(chain = %self.chain, wallet, nonce, "fetched access key");
        let tx = NearTransaction::new(wallet, key.public_key, nonce, receiver, key.block_hash, actions)?;
        Ok(tx.to_borsh()?)
    }

    fn token_call(method: &str, args: Value) -> Action {
        Action::FunctionCall {
            method_name: method.to_string(),
            args: args.to_string().into_bytes(),
            gas: TOKEN_CALL_GAS,
            deposit: ONE_YOCTO,
        }
    }
}

#[async_trait]
impl ChainAdapter for NearAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        Ok(account::implicit_account(public_key)?)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        account::is_valid_account_id(address)
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(account::public_key_from_private(private_key)?.to_vec())
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        validate_account_id(address)?;
        let request = json!({
            "request_type": "view_account",
            "finality": FINALITY,
            "account_id": address,
        });
        let result = retry_read(&self.retry, "view_account", || async {
            match self.transport.rpc("query", request.clone()).await {
                // Unfunded implicit accounts do not exist yet.
                Err(err) if is_missing_account(&err) => Ok(Value::Null),
                other => other.map_err(ChainError::from),
            }
        })
        .await?;
        if result.is_null() {
            return Ok("0".into());
        }
        result["amount"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Decode("view_account: missing amount".into()))
    }

    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError> {
        validate_account_id(address)?;
        validate_account_id(token)?;
        let args = json!({"account_id": address}).to_string();
        let result = self
            .query(json!({
                "request_type": "call_function",
                "finality": FINALITY,
                "account_id": token,
                "method_name": "ft_balance_of",
                "args_base64": BASE64.encode(args),
            }))
            .await?;
        let bytes: Vec<u8> = serde_json::from_value(result["result"].clone())
            .map_err(|e| ChainError::Decode(format!("ft_balance_of: {e}")))?;
        let balance: String = serde_json::from_slice(&bytes)
            .map_err(|e| ChainError::Decode(format!("ft_balance_of: {e}")))?;
        parse_base_units(&balance)?;
        Ok(balance)
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
        validate_account_id(to)?;
        let deposit = parse_base_units(value)?;
        if deposit == 0 {
            return Err(ChainError::InvalidAmount("transfer amount must be positive".into()));
        }
        self.build(wallet, to, vec![Action::Transfer { deposit }]).await
    }

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        transfer.validate()?;
        validate_account_id(&transfer.token)?;
        validate_account_id(&transfer.to)?;
        let token_id = transfer.token_id.as_deref().unwrap_or_default();
        let amount = transfer.amount.as_deref().unwrap_or_default();
        let action = match transfer.standard {
            TokenStandard::Fungible => Self::token_call(
                "ft_transfer",
                json!({"receiver_id": transfer.to, "amount": amount}),
            ),
            TokenStandard::NonFungible => Self::token_call(
                "nft_transfer",
                json!({"receiver_id": transfer.to, "token_id": token_id}),
            ),
            TokenStandard::SemiFungible => Self::token_call(
                "mt_transfer",
                json!({"receiver_id": transfer.to, "token_id": token_id, "amount": amount}),
            ),
            TokenStandard::Partitioned => {
                return Err(ChainError::Unsupported(format!(
                    "{}: partitioned tokens",
                    self.chain
                )))
            }
        };
        self.build(wallet, &transfer.token, vec![action]).await
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(transaction::sign_transaction(payload, private_key)?)
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
        let (tx, _, local_hash) = decode_signed(signed_payload)?;
        let result = self
            .transport
            .rpc("broadcast_tx_async", json!([BASE64.encode(signed_payload)]))
            .await
            .map_err(|err| {
                error!(chain = %self.chain, wallet, error = %err, "broadcast rejected");
                err.into_broadcast_error()
            })?;
        let tx_hash = result.as_str().map(str::to_string).unwrap_or(local_hash);
        lock(&self.submitted).insert(tx_hash.clone(), tx.signer_id);
        info!(chain = %self.chain, wallet, tx_hash = %tx_hash, payload_len = signed_payload.len(), "transaction broadcast");
        Ok(tx_hash)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let sender = lock(&self.submitted).get(tx_hash).cloned().ok_or_else(|| {
            ChainError::Unsupported(format!(
                "{}: status of {tx_hash} needs its sender, which this adapter did not broadcast",
                self.chain
            ))
        })?;
        let result = retry_read(&self.retry, "tx", || async {
            match self.transport.rpc("tx", json!([tx_hash, sender])).await {
                Err(TransportError::Rpc { message, .. })
                    if message.contains("UNKNOWN_TRANSACTION") || message.contains("TIMEOUT_ERROR") =>
                {
                    Ok(Value::Null)
                }
                other => other.map_err(ChainError::from),
            }
        })
        .await?;
        let status = &result["status"];
        if status.get("SuccessValue").is_some() || status.get("SuccessReceiptId").is_some() {
            Ok(TxStatus::Confirmed)
        } else if status.get("Failure").is_some() {
            Ok(TxStatus::Failed)
        } else {
            Ok(TxStatus::Pending)
        }
    }
}
