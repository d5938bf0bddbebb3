use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::kdf::{generate_salt, KdfParams, SALT_LEN};
use crate::secret::SecretBytes;

/// Current on-disk format version.
pub const SEALED_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;

/// A private key encrypted under a passphrase.
///
/// The version and KDF parameters are bound into the AEAD associated data,
/// so altering any stored field makes [`open`] fail.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    pub version: u8,
    pub kdf: KdfParams,
    #[serde(with = "hex::serde")]
    pub salt: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedSecret")
            .field("version", &self.version)
            .field("kdf", &self.kdf)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

fn associated_data(version: u8, kdf: &KdfParams) -> Vec<u8> {
    let mut aad = Vec::with_capacity(13);
    aad.push(version);
    aad.extend_from_slice(&kdf.memory_kib.to_be_bytes());
    aad.extend_from_slice(&kdf.iterations.to_be_bytes());
    aad.extend_from_slice(&kdf.parallelism.to_be_bytes());
    aad
}

/// Encrypts `secret` under a key derived from `passphrase`.
pub fn seal(secret: &[u8], passphrase: &[u8], kdf: KdfParams) -> Result<SealedSecret, CryptoError> {
    let salt = generate_salt();
    let key = kdf.derive_key(passphrase, &salt)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let aad = associated_data(SEALED_VERSION, &kdf);
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: secret,
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

    Ok(SealedSecret {
        version: SEALED_VERSION,
        kdf,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypts a [`SealedSecret`]. Fails with [`CryptoError::OpenFailed`] on a
/// wrong passphrase.
pub fn open(sealed: &SealedSecret, passphrase: &[u8]) -> Result<SecretBytes, CryptoError> {
    if sealed.version != SEALED_VERSION {
        return Err(CryptoError::UnsupportedVersion(sealed.version));
    }
    let salt: &[u8; SALT_LEN] = sealed
        .salt
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Malformed(format!("salt must be {SALT_LEN} bytes")))?;
    if sealed.nonce.len() != NONCE_LEN {
        return Err(CryptoError::Malformed(format!(
            "nonce must be {NONCE_LEN} bytes"
        )));
    }

    let key = sealed.kdf.derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let aad = associated_data(sealed.version, &sealed.kdf);
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::OpenFailed)?;

    Ok(SecretBytes::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams::insecure_fast();

    #[test]
    fn seal_open_roundtrip() {
        let secret = [0x42u8; 32];
        let sealed = seal(&secret, b"hunter2", FAST).unwrap();
        let opened = open(&sealed, b"hunter2").unwrap();
        assert_eq!(opened.expose(), &secret);
    }

    #[test]
    fn ciphertext_does_not_contain_plaintext() {
        let secret = [0x42u8; 32];
        let sealed = seal(&secret, b"pw", FAST).unwrap();
        assert_eq!(sealed.ciphertext.len(), 32 + 16);
        assert_ne!(&sealed.ciphertext[..32], &secret);
    }

    #[test]
    fn wrong_passphrase_fails() {
        let sealed = seal(b"key material", b"right", FAST).unwrap();
        assert!(matches!(open(&sealed, b"wrong"), Err(CryptoError::OpenFailed)));
    }

    #[test]
    fn tampered_params_fail() {
        let mut sealed = seal(b"key material", b"pw", FAST).unwrap();
        sealed.kdf.iterations += 1;
        assert!(matches!(open(&sealed, b"pw"), Err(CryptoError::OpenFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = seal(b"key material", b"pw", FAST).unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(matches!(open(&sealed, b"pw"), Err(CryptoError::OpenFailed)));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut sealed = seal(b"k", b"pw", FAST).unwrap();
        sealed.version = 7;
        assert!(matches!(
            open(&sealed, b"pw"),
            Err(CryptoError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn short_salt_is_malformed() {
        let mut sealed = seal(b"k", b"pw", FAST).unwrap();
        sealed.salt.truncate(4);
        assert!(matches!(open(&sealed, b"pw"), Err(CryptoError::Malformed(_))));
    }

    #[test]
    fn serde_roundtrip_keeps_sealed_openable() {
        let sealed = seal(b"persist me", b"pw", FAST).unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        let restored: SealedSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(open(&restored, b"pw").unwrap().expose(), b"persist me");
    }

    #[test]
    fn debug_hides_ciphertext() {
        let sealed = seal(b"k", b"pw", FAST).unwrap();
        let dbg = format!("{sealed:?}");
        assert!(dbg.contains("ciphertext_len"));
        assert!(!dbg.contains(&hex::encode(&sealed.ciphertext)));
    }
}
