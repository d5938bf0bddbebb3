use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Generate a new 24-word BIP-39 mnemonic (256 bits of entropy)
pub fn generate_mnemonic() -> Result<Zeroizing<String>, WalletError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    Ok(Zeroizing::new(mnemonic?.to_string()))
}

pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// 64-byte BIP-39 seed for `phrase` and an optional passphrase.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn generates_24_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        assert!(validate_mnemonic(&mnemonic));
    }

    #[test]
    fn rejects_invalid_phrase() {
        assert!(!validate_mnemonic("invalid mnemonic phrase here"));
        assert!(matches!(
            mnemonic_to_seed("invalid mnemonic phrase here", ""),
            Err(WalletError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn passphrase_changes_seed() {
        let plain = mnemonic_to_seed(ABANDON, "").unwrap();
        let salted = mnemonic_to_seed(ABANDON, "mypassphrase").unwrap();
        assert_ne!(*plain, *salted);
    }

    #[test]
    fn bip39_test_vector() {
        let seed = mnemonic_to_seed(ABANDON, "").unwrap();
        assert_eq!(
            hex::encode(*seed),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }
}
