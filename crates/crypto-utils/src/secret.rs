use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Decrypted key material that is wiped from memory when dropped.
///
/// `Debug` never prints the contents.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self(data.to_vec())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Borrows the contents as a fixed 32-byte key.
    pub fn as_key32(&self) -> Result<&[u8; 32], CryptoError> {
        self.0
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: self.0.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = SecretBytes::from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let dbg = format!("{secret:?}");
        assert_eq!(dbg, "SecretBytes([REDACTED; 4])");
        assert!(!dbg.contains("de"));
    }

    #[test]
    fn as_key32_checks_length() {
        let ok = SecretBytes::new(vec![7u8; 32]);
        assert_eq!(ok.as_key32().unwrap(), &[7u8; 32]);

        let short = SecretBytes::new(vec![7u8; 31]);
        assert!(matches!(
            short.as_key32(),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn explicit_zeroize_clears_contents() {
        let mut secret = SecretBytes::new(vec![0xffu8; 32]);
        secret.zeroize();
        assert!(secret.is_empty());
    }
}
