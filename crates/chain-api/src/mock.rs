//! Scripted node transport and chain adapter for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{ChainAdapter, FeeEstimator};
use crate::chain::Chain;
use crate::error::{ChainError, TransportError};
use crate::fees::{Congestion, FeePriority, FeeSchedule, FeeSuggestion};
use crate::types::{
    ApprovalRequest, MessageEncoding, MultisigConfig, SignableMessage, SignatureWithSigner,
    TokenTransfer, TxStatus,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Replays canned responses keyed by RPC method, `GET <path>` or
/// `POST <path>`. The last queued response for a key repeats.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: &str, value: Value) -> &Self {
        lock(&self.responses)
            .entry(key.to_string())
            .or_default()
            .push_back(Ok(value));
        self
    }

    pub fn push_error(&self, key: &str, err: TransportError) -> &Self {
        lock(&self.responses)
            .entry(key.to_string())
            .or_default()
            .push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        lock(&self.calls).iter().filter(|(k, _)| k == key).count()
    }

    /// Params of the most recent call for `key`.
    pub fn last_params(&self, key: &str) -> Option<Value> {
        lock(&self.calls)
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.clone())
    }

    fn respond(&self, key: &str, params: Value) -> Result<Value, TransportError> {
        lock(&self.calls).push((key.to_string(), params));
        let mut responses = lock(&self.responses);
        let queue = responses
            .get_mut(key)
            .ok_or_else(|| TransportError::Connection(format!("no mock response for {key}")))?;
        match queue.len() {
            0 => Err(TransportError::Connection(format!("no mock response for {key}"))),
            1 => queue[0].clone(),
            _ => queue
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connection(key.to_string()))),
        }
    }
}

#[async_trait]
impl crate::transport::NodeTransport for MockTransport {
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.respond(method, params)
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        self.respond(&format!("GET {path}"), Value::Null)
    }

    async fn post_text(&self, path: &str, body: String) -> Result<String, TransportError> {
        match self.respond(&format!("POST {path}"), Value::String(body))? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://node"
    }
}

/// A broadcast observed by [`MockAdapter`].
#[derive(Debug, Clone)]
pub struct ExecutedCall {
    pub wallet: String,
    pub payload: Vec<u8>,
    pub signatures: Vec<SignatureWithSigner>,
}

#[derive(Default)]
struct MockAdapterState {
    balances: HashMap<String, String>,
    token_balances: HashMap<(String, String), String>,
    statuses: VecDeque<TxStatus>,
    multisig: HashMap<String, MultisigConfig>,
    executed: Vec<ExecutedCall>,
    broadcast_error: Option<String>,
    broadcast_timeout: Option<String>,
    proposals: u64,
}

/// In-memory adapter with deterministic, non-cryptographic addresses
/// (`mock:<hex pubkey>`). Approval messages are the raw payload under
/// `Personal` encoding.
pub struct MockAdapter {
    chain: Chain,
    execute_delay: Duration,
    state: Mutex<MockAdapterState>,
}

impl MockAdapter {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            execute_delay: Duration::ZERO,
            state: Mutex::new(MockAdapterState::default()),
        }
    }

    /// Delays each broadcast, widening race windows in concurrency tests.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = delay;
        self
    }

    pub fn set_balance(&self, address: &str, amount: &str) {
        lock(&self.state)
            .balances
            .insert(address.to_string(), amount.to_string());
    }

    pub fn set_token_balance(&self, address: &str, token: &str, amount: &str) {
        lock(&self.state)
            .token_balances
            .insert((address.to_string(), token.to_string()), amount.to_string());
    }

    /// Queues statuses returned by `transaction_status`; the last one repeats.
    pub fn push_status(&self, status: TxStatus) {
        lock(&self.state).statuses.push_back(status);
    }

    pub fn set_multisig(&self, reference: &str, config: MultisigConfig) {
        lock(&self.state)
            .multisig
            .insert(reference.to_string(), config);
    }

    pub fn reject_broadcasts(&self, reason: &str) {
        lock(&self.state).broadcast_error = Some(reason.to_string());
    }

    /// Broadcasts reach the node but the reply never arrives.
    pub fn time_out_broadcasts(&self, reason: &str) {
        lock(&self.state).broadcast_timeout = Some(reason.to_string());
    }

    pub fn executed(&self) -> Vec<ExecutedCall> {
        lock(&self.state).executed.clone()
    }

    pub fn execute_count(&self) -> usize {
        lock(&self.state).executed.len()
    }

    fn next_payload(&self, kind: &str, wallet: &str, to: &str, value: &str) -> Vec<u8> {
        let mut state = lock(&self.state);
        state.proposals += 1;
        format!("{kind}|{wallet}|{to}|{value}|{}", state.proposals).into_bytes()
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError> {
        if public_key.len() != 32 && public_key.len() != 33 {
            return Err(ChainError::InvalidKeyEncoding(format!(
                "expected 32 or 33 bytes, got {}",
                public_key.len()
            )));
        }
        Ok(format!("mock:{}", hex::encode(public_key)))
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address
            .strip_prefix("mock:")
            .and_then(|h| hex::decode(h).ok())
            .is_some_and(|b| !b.is_empty())
    }

    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        if private_key.len() != 32 {
            return Err(ChainError::InvalidKeyEncoding("expected 32 bytes".into()));
        }
        Ok(private_key.iter().map(|b| b ^ 0x5a).collect())
    }

    async fn get_balance(&self, address: &str) -> Result<String, ChainError> {
        Ok(lock(&self.state)
            .balances
            .get(address)
            .cloned()
            .unwrap_or_else(|| "0".into()))
    }

    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError> {
        Ok(lock(&self.state)
            .token_balances
            .get(&(address.to_string(), token.to_string()))
            .cloned()
            .unwrap_or_else(|| "0".into()))
    }

    async fn propose_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        _data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        crate::types::parse_base_units(value)?;
        Ok(self.next_payload("tx", wallet, to, value))
    }

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError> {
        transfer.validate()?;
        let value = transfer.amount.clone().unwrap_or_default();
        Ok(self.next_payload("token", wallet, &transfer.to, &value))
    }

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        if private_key.len() != 32 {
            return Err(ChainError::InvalidKeyEncoding("expected 32 bytes".into()));
        }
        let mut signed = b"signed:".to_vec();
        signed.extend_from_slice(payload);
        Ok(signed)
    }

    async fn execute_transaction(
        &self,
        wallet: &str,
        signed_payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError> {
        if !self.execute_delay.is_zero() {
            tokio::time::sleep(self.execute_delay).await;
        }
        let mut state = lock(&self.state);
        state.executed.push(ExecutedCall {
            wallet: wallet.to_string(),
            payload: signed_payload.to_vec(),
            signatures: signatures.to_vec(),
        });
        if let Some(reason) = &state.broadcast_error {
            return Err(ChainError::BroadcastRejected(reason.clone()));
        }
        if let Some(reason) = &state.broadcast_timeout {
            return Err(ChainError::NetworkTimeout(reason.clone()));
        }
        Ok(format!("0xmockhash{:04}", state.executed.len()))
    }

    async fn transaction_status(&self, _tx_hash: &str) -> Result<TxStatus, ChainError> {
        let mut state = lock(&self.state);
        let status = match state.statuses.len() {
            0 => TxStatus::Confirmed,
            1 => state.statuses[0],
            _ => state.statuses.pop_front().unwrap_or(TxStatus::Confirmed),
        };
        Ok(status)
    }

    async fn fetch_multisig_config(&self, reference: &str) -> Result<MultisigConfig, ChainError> {
        lock(&self.state)
            .multisig
            .get(reference)
            .cloned()
            .ok_or_else(|| ChainError::Transport(format!("multisig {reference} unreachable")))
    }

    async fn propose_multisig_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        _data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        crate::types::parse_base_units(value)?;
        Ok(self.next_payload("multisig", wallet, to, value))
    }

    fn approval_message(&self, payload: &[u8]) -> Result<ApprovalRequest, ChainError> {
        Ok(ApprovalRequest {
            encoding: MessageEncoding::Personal,
            message: SignableMessage::Bytes(payload.to_vec()),
        })
    }
}

/// Fee estimator over a fixed schedule and congestion level.
pub struct MockFeeEstimator {
    chain: Chain,
    congestion: Congestion,
    floor: u128,
}

impl MockFeeEstimator {
    pub const SCHEDULE: FeeSchedule = FeeSchedule {
        unit: "mock/unit",
        tier_fees: [0, 10, 25, 50],
        congestion_multipliers: [1000, 1200, 1500, 2000],
        tier_confirmation_secs: [60, 30, 15, 5],
        congestion_delays: [1000, 1000, 1500, 2000],
    };

    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            congestion: Congestion::Medium,
            floor: 100,
        }
    }

    pub fn with_congestion(mut self, congestion: Congestion) -> Self {
        self.congestion = congestion;
        self
    }
}

#[async_trait]
impl FeeEstimator for MockFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        self.congestion
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        Ok(Self::SCHEDULE.suggest(self.chain, priority, self.congestion, self.floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{await_confirmation, ConfirmationPolicy};
    use crate::transport::NodeTransport;
    use serde_json::json;

    #[tokio::test]
    async fn mock_transport_replays_and_repeats_last() {
        let t = MockTransport::new();
        t.push("eth_blockNumber", json!("0x1"));
        t.push("eth_blockNumber", json!("0x2"));

        assert_eq!(t.rpc("eth_blockNumber", json!([])).await.unwrap(), json!("0x1"));
        assert_eq!(t.rpc("eth_blockNumber", json!([])).await.unwrap(), json!("0x2"));
        assert_eq!(t.rpc("eth_blockNumber", json!([])).await.unwrap(), json!("0x2"));
        assert_eq!(t.call_count("eth_blockNumber"), 3);
    }

    #[tokio::test]
    async fn mock_transport_missing_key_is_connection_error() {
        let t = MockTransport::new();
        let err = t.get_json("/fee-estimates").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
        assert_eq!(t.call_count("GET /fee-estimates"), 1);
    }

    #[tokio::test]
    async fn await_confirmation_polls_until_terminal() {
        let adapter = MockAdapter::new(Chain::Ethereum);
        adapter.push_status(TxStatus::Pending);
        adapter.push_status(TxStatus::Pending);
        adapter.push_status(TxStatus::Confirmed);

        let policy = ConfirmationPolicy {
            poll_interval_ms: 1,
            timeout_ms: 1_000,
        };
        let status = await_confirmation(&adapter, "0xabc", &policy).await.unwrap();
        assert_eq!(status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn await_confirmation_returns_pending_on_timeout() {
        let adapter = MockAdapter::new(Chain::Ethereum);
        adapter.push_status(TxStatus::Pending);

        let status = await_confirmation(&adapter, "0xabc", &ConfirmationPolicy::no_wait())
            .await
            .unwrap();
        assert_eq!(status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn mock_adapter_address_roundtrip() {
        let adapter = MockAdapter::new(Chain::Solana);
        let pk = adapter.public_key_from_private(&[1u8; 32]).unwrap();
        let addr = adapter.generate_address(&pk).unwrap();
        assert!(adapter.is_valid_address(&addr));
        assert!(!adapter.is_valid_address("mock:"));
        assert_eq!(adapter.chain_id(), 0);
    }
}
