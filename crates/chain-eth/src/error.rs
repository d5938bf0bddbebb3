use chain_api::ChainError;
use thiserror::Error;

/// EVM chain operation errors.
#[derive(Debug, Error)]
pub enum EthError {
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

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("invalid typed data: {0}")]
    TypedData(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),
}

impl From<EthError> for ChainError {
    fn from(err: EthError) -> Self {
        match err {
            EthError::InvalidPrivateKey(m) | EthError::InvalidPublicKey(m) => {
                ChainError::InvalidKeyEncoding(m)
            }
            EthError::InvalidAddress(m) => ChainError::InvalidAddress(m),
            EthError::InvalidAmount(m) => ChainError::InvalidAmount(m),
            EthError::TransactionBuildError(m) => ChainError::Build(m),
            EthError::SigningError(m) => ChainError::Signing(m),
            EthError::EncodingError(m) | EthError::TypedData(m) => ChainError::Decode(m),
            EthError::UnsupportedChain(m) => ChainError::UnsupportedChain(m),
        }
    }
}
