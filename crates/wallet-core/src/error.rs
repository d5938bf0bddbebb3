use chain_api::ChainError;
use crypto_utils::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The sealed key did not open. Never retried with cached material.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("wallet already exists: {0}")]
    DuplicateWallet(String),

    #[error("signer {0} already signed this proposal")]
    DuplicateSignature(String),

    #[error("{0} is not an authorized signer")]
    UnauthorizedSigner(String),

    #[error("threshold not met: {have} of {need} required signatures")]
    ThresholdNotMet { have: usize, need: u32 },

    #[error("token id is required for this token standard")]
    MissingTokenId,

    #[error("partition is required for partitioned token transfers")]
    MissingPartition,

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("network timeout: {0}")]
    NetworkTimeout(String),

    /// Carries the node's rejection reason verbatim.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("proposal {0} is closed")]
    ProposalClosed(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Stable snake_case name of the variant, used in audit details.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAddress(_) => "invalid_address",
            WalletError::InvalidKeyEncoding(_) => "invalid_key_encoding",
            WalletError::InvalidPassphrase => "invalid_passphrase",
            WalletError::DuplicateWallet(_) => "duplicate_wallet",
            WalletError::DuplicateSignature(_) => "duplicate_signature",
            WalletError::UnauthorizedSigner(_) => "unauthorized_signer",
            WalletError::ThresholdNotMet { .. } => "threshold_not_met",
            WalletError::MissingTokenId => "missing_token_id",
            WalletError::MissingPartition => "missing_partition",
            WalletError::UnsupportedChain(_) => "unsupported_chain",
            WalletError::InsufficientFunds(_) => "insufficient_funds",
            WalletError::NetworkTimeout(_) => "network_timeout",
            WalletError::BroadcastRejected(_) => "broadcast_rejected",
            WalletError::WalletNotFound(_) => "wallet_not_found",
            WalletError::ProposalNotFound(_) => "proposal_not_found",
            WalletError::ProposalClosed(_) => "proposal_closed",
            WalletError::InvalidSignature(_) => "invalid_signature",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::UnsupportedOperation(_) => "unsupported_operation",
            WalletError::InvalidMnemonic(_) => "invalid_mnemonic",
            WalletError::DerivationFailed(_) => "derivation_failed",
            WalletError::Signing(_) => "signing",
            WalletError::Transport(_) => "transport",
            WalletError::Store(_) => "store",
            WalletError::Config(_) => "config",
            WalletError::Internal(_) => "internal",
        }
    }
}

impl From<ChainError> for WalletError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::InvalidAddress(m) => WalletError::InvalidAddress(m),
            ChainError::InvalidKeyEncoding(m) => WalletError::InvalidKeyEncoding(m),
            ChainError::InvalidAmount(m) => WalletError::InvalidAmount(m),
            ChainError::MissingTokenId => WalletError::MissingTokenId,
            ChainError::MissingPartition => WalletError::MissingPartition,
            ChainError::InsufficientFunds(m) => WalletError::InsufficientFunds(m),
            ChainError::NetworkTimeout(m) => WalletError::NetworkTimeout(m),
            ChainError::BroadcastRejected(m) => WalletError::BroadcastRejected(m),
            ChainError::UnsupportedChain(m) => WalletError::UnsupportedChain(m),
            ChainError::Unsupported(m) => WalletError::UnsupportedOperation(m),
            ChainError::Transport(m) => WalletError::Transport(m),
            ChainError::Decode(m) => WalletError::Transport(format!("malformed node data: {m}")),
            ChainError::Build(m) => WalletError::Internal(format!("transaction build failed: {m}")),
            ChainError::Signing(m) => WalletError::Signing(m),
        }
    }
}

impl From<CryptoError> for WalletError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::OpenFailed => WalletError::InvalidPassphrase,
            CryptoError::InvalidKeyLength { expected, actual } => WalletError::InvalidKeyEncoding(
                format!("expected {expected} bytes, got {actual}"),
            ),
            other => WalletError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_passphrase() {
        assert_eq!(WalletError::InvalidPassphrase.to_string(), "invalid passphrase");
    }

    #[test]
    fn display_threshold_not_met() {
        let err = WalletError::ThresholdNotMet { have: 1, need: 2 };
        assert_eq!(err.to_string(), "threshold not met: 1 of 2 required signatures");
    }

    #[test]
    fn display_unauthorized_signer() {
        let err = WalletError::UnauthorizedSigner("0xdead".into());
        assert_eq!(err.to_string(), "0xdead is not an authorized signer");
    }

    #[test]
    fn broadcast_rejection_keeps_node_reason() {
        let err: WalletError = ChainError::BroadcastRejected("nonce too low".into()).into();
        assert_eq!(err.to_string(), "broadcast rejected: nonce too low");
        assert_eq!(err.code(), "broadcast_rejected");
    }

    #[test]
    fn chain_errors_keep_their_class() {
        assert!(matches!(
            WalletError::from(ChainError::MissingTokenId),
            WalletError::MissingTokenId
        ));
        assert!(matches!(
            WalletError::from(ChainError::InsufficientFunds("tecUNFUNDED_PAYMENT".into())),
            WalletError::InsufficientFunds(_)
        ));
        assert!(matches!(
            WalletError::from(ChainError::Unsupported("tokens".into())),
            WalletError::UnsupportedOperation(_)
        ));
    }

    #[test]
    fn open_failure_is_invalid_passphrase() {
        assert!(matches!(
            WalletError::from(CryptoError::OpenFailed),
            WalletError::InvalidPassphrase
        ));
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(WalletError::Internal("boom".into()));
        assert_eq!(err.to_string(), "internal error: boom");
    }
}
