use chain_api::ChainError;
use thiserror::Error;

/// NEAR chain operation errors.
#[derive(Debug, Error)]
pub enum NearError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("signing error: {0}")]
    SigningError(String),
}

impl From<NearError> for ChainError {
    fn from(err: NearError) -> Self {
        match err {
            NearError::InvalidPrivateKey(_) | NearError::InvalidPublicKey(_) => {
                ChainError::InvalidKeyEncoding(err.to_string())
            }
            NearError::InvalidAccountId(msg) => ChainError::InvalidAddress(msg),
            NearError::InvalidAmount(msg) => ChainError::InvalidAmount(msg),
            NearError::SerializationError(msg) => ChainError::Decode(msg),
            NearError::SigningError(msg) => ChainError::Signing(msg),
        }
    }
}
