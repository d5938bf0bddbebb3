use crypto_utils::{open, seal, KdfParams, SealedSecret, SecretBytes};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// A Single-Key wallet's private key, encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedKey(SealedSecret);

impl SealedKey {
    pub fn kdf(&self) -> KdfParams {
        self.0.kdf
    }
}

/// Where private keys are sealed and opened.
///
/// Implementations are called from blocking threads; the passphrase is
/// never stored.
pub trait KeyCustody: Send + Sync {
    fn seal(&self, private_key: &[u8], passphrase: &str) -> Result<SealedKey, WalletError>;

    /// Fails with [`WalletError::InvalidPassphrase`] when the key does not open.
    fn open(&self, sealed: &SealedKey, passphrase: &str) -> Result<SecretBytes, WalletError>;
}

/// Argon2id + AES-256-GCM sealing, with the ciphertext kept in the wallet record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeystore {
    kdf: KdfParams,
}

impl LocalKeystore {
    pub fn new(kdf: KdfParams) -> Result<Self, WalletError> {
        kdf.validate()?;
        Ok(Self { kdf })
    }
}

impl KeyCustody for LocalKeystore {
    fn seal(&self, private_key: &[u8], passphrase: &str) -> Result<SealedKey, WalletError> {
        if passphrase.is_empty() {
            return Err(WalletError::InvalidPassphrase);
        }
        Ok(SealedKey(seal(private_key, passphrase.as_bytes(), self.kdf)?))
    }

    fn open(&self, sealed: &SealedKey, passphrase: &str) -> Result<SecretBytes, WalletError> {
        let secret = open(&sealed.0, passphrase.as_bytes())?;
        secret.as_key32()?;
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> LocalKeystore {
        LocalKeystore::new(KdfParams::insecure_fast()).unwrap()
    }

    #[test]
    fn seal_then_open() {
        let ks = keystore();
        let sealed = ks.seal(&[7u8; 32], "P@ssw0rd1").unwrap();
        let opened = ks.open(&sealed, "P@ssw0rd1").unwrap();
        assert_eq!(opened.expose(), &[7u8; 32]);
        assert_eq!(sealed.kdf(), KdfParams::insecure_fast());
    }

    #[test]
    fn wrong_passphrase_is_invalid_passphrase() {
        let ks = keystore();
        let sealed = ks.seal(&[7u8; 32], "P@ssw0rd1").unwrap();
        assert!(matches!(ks.open(&sealed, "wrong"), Err(WalletError::InvalidPassphrase)));
    }

    #[test]
    fn empty_passphrase_is_refused() {
        assert!(matches!(
            keystore().seal(&[7u8; 32], ""),
            Err(WalletError::InvalidPassphrase)
        ));
    }

    #[test]
    fn sealed_key_serializes_without_plaintext() {
        let sealed = keystore().seal(&[0xab; 32], "P@ssw0rd1").unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        assert!(!json.contains(&"ab".repeat(32)));
        let back: SealedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn invalid_kdf_is_rejected() {
        let kdf = KdfParams {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        assert!(LocalKeystore::new(kdf).is_err());
    }
}
