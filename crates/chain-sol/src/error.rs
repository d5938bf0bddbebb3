use chain_api::ChainError;
use thiserror::Error;

/// Solana chain operation errors.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<SolError> for ChainError {
    fn from(err: SolError) -> Self {
        match err {
            SolError::InvalidPrivateKey(_) | SolError::InvalidPublicKey(_) => {
                ChainError::InvalidKeyEncoding(err.to_string())
            }
            SolError::InvalidAddress(msg) => ChainError::InvalidAddress(msg),
            SolError::InvalidAmount(msg) => ChainError::InvalidAmount(msg),
            SolError::TransactionBuildError(msg) => ChainError::Build(msg),
            SolError::SigningError(msg) => ChainError::Signing(msg),
            SolError::SerializationError(msg) => ChainError::Decode(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_public_key() {
        let err = SolError::InvalidPublicKey("not on curve".into());
        assert_eq!(err.to_string(), "invalid public key: not on curve");
    }

    #[test]
    fn display_invalid_amount() {
        let err = SolError::InvalidAmount("lamports must be > 0".into());
        assert_eq!(err.to_string(), "invalid amount: lamports must be > 0");
    }

    #[test]
    fn display_serialization_error() {
        let err = SolError::SerializationError("compact-u16 overflow".into());
        assert_eq!(err.to_string(), "serialization error: compact-u16 overflow");
    }

    #[test]
    fn converts_into_chain_error() {
        let err: ChainError = SolError::InvalidPrivateKey("31 bytes".into()).into();
        assert!(matches!(err, ChainError::InvalidKeyEncoding(_)));

        let err: ChainError = SolError::SigningError("not a signer".into()).into();
        assert!(matches!(err, ChainError::Signing(ref m) if m == "not a signer"));
    }
}
