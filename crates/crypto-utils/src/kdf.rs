use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Salt length for Argon2id, in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Argon2id cost parameters.
///
/// The parameters are stored next to every sealed secret so that a sealed
/// key stays openable after the defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Minimal cost parameters for tests and local development.
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KdfFailed(format!("invalid argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Checks that the parameters are accepted by Argon2.
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.argon2().map(|_| ())
    }

    /// Derives a 32-byte encryption key from `passphrase` and `salt`.
    pub fn derive_key(
        &self,
        passphrase: &[u8],
        salt: &[u8; SALT_LEN],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        self.argon2()?
            .hash_password_into(passphrase, salt, output.as_mut())
            .map_err(|e| CryptoError::KdfFailed(format!("argon2 hash failed: {e}")))?;
        Ok(output)
    }
}

/// Generates a random salt from the OS RNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams::insecure_fast();

    #[test]
    fn default_params_match_recommended_cost() {
        let params = KdfParams::default();
        assert_eq!(params.memory_kib, 65536);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 4);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn derive_key_deterministic() {
        let salt = [0xABu8; SALT_LEN];
        let k1 = FAST.derive_key(b"correct horse", &salt).unwrap();
        let k2 = FAST.derive_key(b"correct horse", &salt).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn different_passphrases_differ() {
        let salt = [0x01u8; SALT_LEN];
        let k1 = FAST.derive_key(b"passphrase-a", &salt).unwrap();
        let k2 = FAST.derive_key(b"passphrase-b", &salt).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn different_salts_differ() {
        let k1 = FAST.derive_key(b"same", &[0x01; SALT_LEN]).unwrap();
        let k2 = FAST.derive_key(b"same", &[0x02; SALT_LEN]).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn different_params_differ() {
        let salt = [0x05u8; SALT_LEN];
        let other = KdfParams {
            iterations: 2,
            ..FAST
        };
        let k1 = FAST.derive_key(b"pw", &salt).unwrap();
        let k2 = other.derive_key(b"pw", &salt).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn zero_iterations_rejected() {
        let params = KdfParams {
            iterations: 0,
            ..FAST
        };
        assert!(matches!(
            params.validate(),
            Err(CryptoError::KdfFailed(_))
        ));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
