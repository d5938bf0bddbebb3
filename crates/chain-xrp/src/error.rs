use chain_api::ChainError;
use thiserror::Error;

/// XRP Ledger operation errors.
#[derive(Debug, Error)]
pub enum XrpError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("signing error: {0}")]
    SigningError(String),
}

impl From<XrpError> for ChainError {
    fn from(err: XrpError) -> Self {
        match err {
            XrpError::InvalidPrivateKey(_) | XrpError::InvalidPublicKey(_) => {
                ChainError::InvalidKeyEncoding(err.to_string())
            }
            XrpError::InvalidAddress(msg) => ChainError::InvalidAddress(msg),
            XrpError::InvalidAmount(msg) => ChainError::InvalidAmount(msg),
            XrpError::InvalidCurrency(_) => ChainError::Build(err.to_string()),
            XrpError::SerializationError(msg) => ChainError::Decode(msg),
            XrpError::SigningError(msg) => ChainError::Signing(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_currency() {
        let err = XrpError::InvalidCurrency("XRP".into());
        assert_eq!(err.to_string(), "invalid currency: XRP");
    }

    #[test]
    fn display_signing_error() {
        let err = XrpError::SigningError("account mismatch".into());
        assert_eq!(err.to_string(), "signing error: account mismatch");
    }

    #[test]
    fn converts_to_chain_error() {
        let err: ChainError = XrpError::InvalidAddress("rXYZ".into()).into();
        assert!(matches!(err, ChainError::InvalidAddress(m) if m == "rXYZ"));
        let err: ChainError = XrpError::InvalidPrivateKey("zero".into()).into();
        assert!(matches!(err, ChainError::InvalidKeyEncoding(_)));
    }
}
