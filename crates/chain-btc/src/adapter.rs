use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    parse_base_units, retry_read, Chain, ChainAdapter, ChainError, FeeEstimator, FeePriority,
    NodeTransport, RetryPolicy, SignatureWithSigner, TokenTransfer, TransportError, TxStatus,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::address::{self, script_pubkey};
use crate::fees::BtcFeeEstimator;
use crate::network::BtcNetwork;
use crate::transaction::{build_p2wpkh_transaction, sign_transaction, txid_of, UnsignedBtcTx};
use crate::utxo::Utxo;

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraStats {
    #[serde(default)]
    funded_txo_sum: u64,
    #[serde(default)]
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    #[serde(default)]
    chain_stats: EsploraStats,
    #[serde(default)]
    mempool_stats: EsploraStats,
}

/// Chain adapter for Bitcoin over an Esplora REST endpoint.
///
/// Payloads are JSON [`crate::transaction::BtcPayload`]s; the UTXO set spent
/// by a payload is its ordering token. Tokens and multisig are unsupported.
pub struct BtcAdapter {
    network: BtcNetwork,
    transport: Arc<dyn NodeTransport>,
    fees: BtcFeeEstimator,
    retry: RetryPolicy,
}

impl BtcAdapter {
    pub fn new(
        chain: Chain,
        transport: Arc<dyn NodeTransport>,
        retry: RetryPolicy,
    ) -> Result<Self, ChainError> {
        let network = BtcNetwork::from_chain(chain)?;
        Ok(Self {
            network,
            fees: BtcFeeEstimator::new(chain, transport.clone(), retry),
            transport,
            retry,
        })
    }

    async fn get(&self, path: String) -> Result<Value, ChainError> {
        retry_read(&self.retry, "esplora", || async {
            self.transport.get_json(&path).await.map_err(ChainError::from)
        })
        .await
    }

    async fn utxos(&self, wallet: &str) -> Result<Vec<Utxo>, ChainError> {
        let script = script_pubkey(wallet, self.network)?.to_bytes();
        let raw = self.get(format!("address/{wallet}/utxo")).await?;
        let utxos: Vec<EsploraUtxo> = serde_json::from_value(raw)
            .map_err(|e| ChainError::Decode(format!("utxo list: {e}")))?;
        debug!(chain = %self.chain(), wallet, count = utxos.len(), "fetched utxos");
        Ok(utxos
            .into_iter()
            .map(|u| Utxo {
                txid: u.txid,
                vout: u.vout,
                amount_sat: u.value,
                script_pubkey: script.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ChainAdapter for BtcAdapter {
    fn chain(&self) -> Chain {
        self.network.chain()
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        Ok(address::pubkey_to_p2wpkh_address(public_key, self.network)?)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::validate_address(address, self.network).unwrap_or(false)
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(address::public_key_from_private(private_key)?.to_vec())
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        address::parse_address(address, self.network)?;
        let raw = self.get(format!("address/{address}")).await?;
        let info: EsploraAddress = serde_json::from_value(raw)
            .map_err(|e| ChainError::Decode(format!("address stats: {e}")))?;
        let funded = u128::from(info.chain_stats.funded_txo_sum)
            + u128::from(info.mempool_stats.funded_txo_sum);
        let spent = u128::from(info.chain_stats.spent_txo_sum)
            + u128::from(info.mempool_stats.spent_txo_sum);
        Ok(funded.saturating_sub(spent).to_string())
    }

    async fn get_token_balance(&self, _address: &str, _token: &str) -> Result<String, ChainError> {
        Err(ChainError::Unsupported(format!("{}: tokens", self.chain())))
    }

    async fn propose_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        if data.is_some_and(|d| !d.is_empty()) {
            return Err(ChainError::Unsupported(format!(
                "{}: call data",
                self.chain()
            )));
        }
        address::parse_address(to, self.network)?;
        let amount = parse_base_units(value)?;
        let amount_sat = u64::try_from(amount)
            .map_err(|_| ChainError::InvalidAmount(format!("{value} sat exceeds the supply")))?;

        let utxos = self.utxos(wallet).await?;
        let rate = self.fees.estimate_fee(FeePriority::Medium).await?.fee_per_unit;
        let rate = u64::try_from(rate)
            .map_err(|_| ChainError::Build(format!("fee rate {rate} out of range")))?;

        let unsigned =
            build_p2wpkh_transaction(&utxos, to, amount_sat, wallet, rate, self.network)?;
        debug!(
            chain = %self.chain(),
            inputs = unsigned.tx.input.len(),
            fee_sat = unsigned.fee_sat,
            rate,
            "built bitcoin transaction"
        );
        Ok(unsigned.to_payload(self.network)?)
    }

    async fn propose_token_transfer(
        &self,
        _wallet: &str,
        _transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        Err(ChainError::Unsupported(format!("{}: tokens", self.chain())))
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        let (unsigned, network) = UnsignedBtcTx::from_payload(payload)?;
        if network != self.network {
            return Err(ChainError::Signing(format!(
                "payload is for {network}, adapter is {}",
                self.network
            )));
        }
        Ok(sign_transaction(&unsigned, private_key)?)
    }

    async fn execute_transaction(
        &self,
        wallet: &str,
        signed_payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError> {
        if !signatures.is_empty() {
            return Err(ChainError::Unsupported(format!("{}: multisig", self.chain())));
        }
        let expected = txid_of(signed_payload)?;
        let txid = self
            .transport
            .post_text("tx", hex::encode(signed_payload))
            .await
            .map_err(|err| {
                error!(chain = %self.chain(), wallet, error = %err, "broadcast rejected");
                err.into_broadcast_error()
            })?;
        let txid = txid.trim().to_string();
        if txid != expected {
            debug!(chain = %self.chain(), %txid, %expected, "node returned unexpected txid");
        }
        info!(chain = %self.chain(), wallet, tx_hash = %txid, payload_len = signed_payload.len(), "transaction broadcast");
        Ok(txid)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let path = format!("tx/{tx_hash}/status");
        let status = retry_read(&self.retry, "esplora", || async {
            match self.transport.get_json(&path).await {
                // Esplora 404s until the transaction propagates.
                Err(TransportError::Http { status: 404, .. }) => Ok(Value::Null),
                other => other.map_err(ChainError::from),
            }
        })
        .await?;
        if status["confirmed"].as_bool().unwrap_or(false) {
            Ok(TxStatus::Confirmed)
        } else {
            Ok(TxStatus::Pending)
        }
    }
}
