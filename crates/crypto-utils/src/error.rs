use thiserror::Error;

/// Errors raised while sealing or opening key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("sealing failed: {0}")]
    SealFailed(String),

    /// Authentication tag mismatch. A wrong passphrase and a tampered
    /// ciphertext are indistinguishable by construction.
    #[error("wrong passphrase or corrupted ciphertext")]
    OpenFailed,

    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("unsupported sealed secret version: {0}")]
    UnsupportedVersion(u8),

    #[error("malformed sealed secret: {0}")]
    Malformed(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_seal_failed() {
        let err = CryptoError::SealFailed("aead seal error".into());
        assert_eq!(err.to_string(), "sealing failed: aead seal error");
    }

    #[test]
    fn display_open_failed() {
        assert_eq!(
            CryptoError::OpenFailed.to_string(),
            "wrong passphrase or corrupted ciphertext"
        );
    }

    #[test]
    fn display_kdf_failed() {
        let err = CryptoError::KdfFailed("out of memory".into());
        assert_eq!(err.to_string(), "key derivation failed: out of memory");
    }

    #[test]
    fn display_unsupported_version() {
        let err = CryptoError::UnsupportedVersion(9);
        assert_eq!(err.to_string(), "unsupported sealed secret version: 9");
    }

    #[test]
    fn display_invalid_key_length() {
        let err = CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 31,
        };
        assert_eq!(
            err.to_string(),
            "invalid key length: expected 32 bytes, got 31"
        );
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(CryptoError::Malformed("salt".into()));
        assert!(err.to_string().contains("salt"));
    }
}
