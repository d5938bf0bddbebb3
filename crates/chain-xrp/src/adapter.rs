use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    parse_base_units, retry_read, Chain, ChainAdapter, ChainError, ChainFamily, FeeEstimator,
    FeePriority, NodeTransport, RetryPolicy, SignatureWithSigner, TokenStandard, TokenTransfer,
    TxStatus,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::address::{self, decode_address};
use crate::amount::{decimal_to_base_units, Amount, IouValue, IssuedToken};
use crate::codec::Payment;
use crate::fees::XrpFeeEstimator;
use crate::signing::{sign_payment, verify_signed};

pub const MAINNET_RPC: &str = "https://s1.ripple.com:51234";
pub const TESTNET_RPC: &str = "https://s.altnet.rippletest.net:51234";

/// Ledgers a proposal stays valid for.
pub const LAST_LEDGER_OFFSET: u32 = 20;

/// rippled reports most failures inside `result` with `status: "error"`.
fn rippled_error(result: &Value) -> Option<String> {
    if result["status"] != "error" {
        return None;
    }
    let code = result["error"].as_str().unwrap_or("error");
    Some(match result["error_message"].as_str() {
        Some(message) => format!("{code}: {message}"),
        None => code.to_string(),
    })
}

/// Chain adapter for the XRP Ledger.
///
/// Payloads are unsigned Payment blobs in the XRPL binary format. The
/// account `Sequence` plus a `LastLedgerSequence` window are the ordering
/// token.
pub struct XrpAdapter {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    retry: RetryPolicy,
    fees: XrpFeeEstimator,
}

impl XrpAdapter {
    pub fn new(chain: Chain, transport: Arc<dyn NodeTransport>, retry: RetryPolicy) -> Result<Self, ChainError> {
        if chain.family() != ChainFamily::Ripple {
            return Err(ChainError::UnsupportedChain(format!("{chain} is not an XRP Ledger network")));
        }
        let fees = XrpFeeEstimator::new(chain, transport.clone(), retry);
        Ok(Self {
            chain,
            transport,
            retry,
            fees,
        })
    }

    pub fn fee_estimator(&self) -> XrpFeeEstimator {
        XrpFeeEstimator::new(self.chain, self.transport.clone(), self.retry)
    }

    async fn read(&self, method: &'static str, params: Value) -> Result<Value, ChainError> {
        retry_read(&self.retry, method, || async {
            self.transport
                .rpc(method, json!([params.clone()]))
                .await
                .map_err(ChainError::from)
        })
        .await
    }

    /// Returns `None` for accounts that are not yet funded.
    async fn account_info(&self, account: &str) -> Result<Option<Value>, ChainError> {
        let result = self
            .read("account_info", json!({"account": account, "ledger_index": "current"}))
            .await?;
        if result["error"] == "actNotFound" {
            return Ok(None);
        }
        if let Some(err) = rippled_error(&result) {
            return Err(ChainError::Transport(format!("account_info: {err}")));
        }
        Ok(Some(result["account_data"].clone()))
    }

    async fn build(&self, wallet: &str, destination: &str, amount: Amount) -> Result<Vec<u8>, ChainError> {
        let account = decode_address(wallet)?;
        let destination = decode_address(destination)?;
        let data = self.account_info(wallet).await?.ok_or_else(|| {
            ChainError::InsufficientFunds(format!("{wallet} is not funded (actNotFound)"))
        })?;
        let sequence = data["Sequence"]
            .as_u64()
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| ChainError::Decode("account_info: missing Sequence".into()))?;

        let current = self.read("ledger_current", json!({})).await?;
        let ledger = current["ledger_current_index"]
            .as_u64()
            .and_then(|l| u32::try_from(l).ok())
            .ok_or_else(|| ChainError::Decode("ledger_current: missing ledger_current_index".into()))?;

        let fee = self.fees.estimate_fee(FeePriority::Medium).await?.fee_per_unit;
        let fee = u64::try_from(fee).map_err(|_| ChainError::Build(format!("fee {fee} out of range")))?;
        debug!(chain = %self.chain, wallet, sequence, ledger, fee, "fetched account sequence");

        let tx = Payment {
            account,
            destination,
            amount,
            fee,
            sequence,
            last_ledger_sequence: ledger.saturating_add(LAST_LEDGER_OFFSET),
            flags: 0,
            destination_tag: None,
            signing_pub_key: None,
            txn_signature: None,
        };
        Ok(tx.to_bytes()?)
    }
}

#[async_trait]
impl ChainAdapter for XrpAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        Ok(address::address_from_public_key(public_key)?)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::is_valid_address(address)
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(address::public_key_from_private(private_key)?)
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        decode_address(address)?;
        let Some(data) = self.account_info(address).await? else {
            return Ok("0".into());
        };
        data["Balance"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Decode("account_info: missing Balance".into()))
    }

    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError> {
        decode_address(address)?;
        let token = IssuedToken::parse(token)?;
        let result = self
            .read(
                "account_lines",
                json!({"account": address, "peer": token.issuer_address(), "ledger_index": "validated"}),
            )
            .await?;
        if result["error"] == "actNotFound" {
            return Ok("0".into());
        }
        if let Some(err) = rippled_error(&result) {
            return Err(ChainError::Transport(format!("account_lines: {err}")));
        }
        let code = token.currency.code();
        let line = result["lines"]
            .as_array()
            .and_then(|lines| lines.iter().find(|l| l["currency"] == code.as_str()));
        let Some(line) = line else {
            return Ok("0".into());
        };
        let balance = line["balance"]
            .as_str()
            .ok_or_else(|| ChainError::Decode("account_lines: missing balance".into()))?;
        Ok(decimal_to_base_units(balance)?.to_string())
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
        let drops = parse_base_units(value)?;
        if drops == 0 {
            return Err(ChainError::InvalidAmount("payment amount must be positive".into()));
        }
        self.build(wallet, to, Amount::drops(drops)?).await
    }

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        transfer.validate()?;
        if transfer.standard != TokenStandard::Fungible {
            return Err(ChainError::Unsupported(format!(
                "{}: {:?} tokens",
                self.chain, transfer.standard
            )));
        }
        let token = IssuedToken::parse(&transfer.token)?;
        let units = transfer.amount_u128()?;
        if units == 0 {
            return Err(ChainError::InvalidAmount("payment amount must be positive".into()));
        }
        let amount = Amount::Issued {
            value: IouValue::from_base_units(units)?,
            token,
        };
        self.build(wallet, &transfer.to, amount).await
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(sign_payment(payload, private_key)?)
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
        let (_, tx_hash) = verify_signed(signed_payload)?;
        let result = self
            .transport
            .rpc("submit", json!([{"tx_blob": hex::encode_upper(signed_payload)}]))
            .await
            .map_err(|err| {
                error!(chain = %self.chain, wallet, error = %err, "broadcast rejected");
                err.into_broadcast_error()
            })?;

        let engine_result = result["engine_result"].as_str().unwrap_or_default();
        let accepted = engine_result.starts_with("tes") || engine_result == "terQUEUED";
        if !accepted {
            let reason = match rippled_error(&result) {
                Some(err) => err,
                None => format!(
                    "{engine_result}: {}",
                    result["engine_result_message"].as_str().unwrap_or_default()
                ),
            };
            error!(chain = %self.chain, wallet, reason = %reason, "broadcast rejected");
            return Err(if chain_api::error::is_insufficient_funds(&reason) {
                ChainError::InsufficientFunds(reason)
            } else {
                ChainError::BroadcastRejected(reason)
            });
        }
        info!(chain = %self.chain, wallet, tx_hash = %tx_hash, engine_result, payload_len = signed_payload.len(), "transaction broadcast");
        Ok(tx_hash)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let result = self.read("tx", json!({"transaction": tx_hash})).await?;
        if result["error"] == "txnNotFound" {
            return Ok(TxStatus::Pending);
        }
        if let Some(err) = rippled_error(&result) {
            return Err(ChainError::Transport(format!("tx: {err}")));
        }
        if result["validated"] != true {
            return Ok(TxStatus::Pending);
        }
        match result["meta"]["TransactionResult"].as_str() {
            Some("tesSUCCESS") => Ok(TxStatus::Confirmed),
            Some(_) => Ok(TxStatus::Failed),
            None => Ok(TxStatus::Pending),
        }
    }
}
