use async_trait::async_trait;

use crate::chain::Chain;
use crate::error::ChainError;
use crate::fees::{Congestion, FeePriority, FeeSuggestion};
use crate::types::{ApprovalRequest, MultisigConfig, SignatureWithSigner, TokenTransfer, TxStatus};

/// Protocol driver for one chain.
///
/// Payloads are opaque byte strings owned by the adapter: whatever
/// `propose_*` returns is exactly what `sign_transaction` and, for multisig,
/// `approval_message` accept. Amounts are decimal strings in base units.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> Chain;

    fn chain_name(&self) -> &'static str {
        self.chain().display_name()
    }

    /// EVM chain id, or 0 for chains without one.
    fn chain_id(&self) -> u64 {
        self.chain().evm_chain_id().unwrap_or(0)
    }

    /// Derives the address for a public key in the encoding the chain uses.
    fn generate_address(&self, public_key: &[u8]) -> Result<String, ChainError>;

    /// Pure syntax/checksum check, no network access.
    fn is_valid_address(&self, address: &str) -> bool;

    /// Public key bytes accepted by [`ChainAdapter::generate_address`].
    fn public_key_from_private(&self, private_key: &[u8]) -> Result<Vec<u8>, ChainError>;

    async fn get_balance(&self, address: &str) -> Result<String, ChainError>;

    /// Returns `"0"` when the address holds no association with the token.
    async fn get_token_balance(&self, address: &str, token: &str) -> Result<String, ChainError>;

    /// Builds an unsigned transfer, fetching a fresh ordering token.
    async fn propose_transaction(
        &self,
        wallet: &str,
        to: &str,
        value: &str,
        data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError>;

    async fn propose_token_transfer(
        &self,
        wallet: &str,
        transfer: &TokenTransfer,
    ) -> Result<Vec<u8>, ChainError>;

    fn sign_transaction(&self, payload: &[u8], private_key: &[u8]) -> Result<Vec<u8>, ChainError>;

    /// Broadcasts and returns the transaction hash. For multisig payloads,
    /// `signatures` carries the collected approvals.
    async fn execute_transaction(
        &self,
        wallet: &str,
        signed_payload: &[u8],
        signatures: &[SignatureWithSigner],
    ) -> Result<String, ChainError>;

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError>;

    async fn fetch_multisig_config(&self, reference: &str) -> Result<MultisigConfig, ChainError> {
        Err(ChainError::Unsupported(format!(
            "{}: multisig accounts (requested {reference})",
            self.chain()
        )))
    }

    /// Builds a payload that a multisig account executes once approved.
    async fn propose_multisig_transaction(
        &self,
        wallet: &str,
        _to: &str,
        _value: &str,
        _data: Option<&[u8]>,
    ) -> Result<Vec<u8>, ChainError> {
        Err(ChainError::Unsupported(format!(
            "{}: multisig proposals for {wallet}",
            self.chain()
        )))
    }

    /// What each signer signs to approve a multisig payload.
    fn approval_message(&self, _payload: &[u8]) -> Result<ApprovalRequest, ChainError> {
        Err(ChainError::Unsupported(format!(
            "{}: multisig approvals",
            self.chain()
        )))
    }
}

/// Turns network signals into a priority-tiered fee suggestion.
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    fn chain(&self) -> Chain;

    /// Current congestion. Signal failures degrade to `Medium`.
    async fn congestion(&self) -> Congestion;

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError>;
}
