use chain_api::ChainError;
use thiserror::Error;

/// Bitcoin chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: have {have} sat, need {need} sat")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<BtcError> for ChainError {
    fn from(err: BtcError) -> Self {
        match err {
            BtcError::InvalidPrivateKey(_) | BtcError::InvalidPublicKey(_) => {
                ChainError::InvalidKeyEncoding(err.to_string())
            }
            BtcError::InvalidAddress(msg) => ChainError::InvalidAddress(msg),
            BtcError::InvalidAmount(msg) => ChainError::InvalidAmount(msg),
            BtcError::InsufficientFunds { .. } => ChainError::InsufficientFunds(err.to_string()),
            BtcError::TransactionBuildError(msg) => ChainError::Build(msg),
            BtcError::SigningError(msg) => ChainError::Signing(msg),
            BtcError::InvalidPayload(msg) => ChainError::Decode(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_private_key() {
        let err = BtcError::InvalidPrivateKey("key too short".into());
        assert_eq!(err.to_string(), "invalid private key: key too short");
    }

    #[test]
    fn display_invalid_address() {
        let err = BtcError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_insufficient_funds() {
        let err = BtcError::InsufficientFunds { have: 1_000, need: 50_141 };
        assert_eq!(err.to_string(), "insufficient funds: have 1000 sat, need 50141 sat");
    }

    #[test]
    fn display_signing_error() {
        let err = BtcError::SigningError("sighash failed".into());
        assert_eq!(err.to_string(), "signing error: sighash failed");
    }

    #[test]
    fn converts_into_chain_error() {
        let err: ChainError = BtcError::InsufficientFunds { have: 1, need: 2 }.into();
        assert!(matches!(err, ChainError::InsufficientFunds(_)));

        let err: ChainError = BtcError::InvalidPublicKey("not on curve".into()).into();
        assert!(matches!(err, ChainError::InvalidKeyEncoding(_)));

        let err: ChainError = BtcError::InvalidAmount("abc".into()).into();
        assert!(matches!(err, ChainError::InvalidAmount(_)));
    }
}
