//! # crypto-utils
//!
//! Passphrase-based sealing of private keys (Argon2id + AES-256-GCM) and
//! zeroize-on-drop containers for decrypted key material.

pub mod error;
pub mod kdf;
pub mod sealed;
pub mod secret;

pub use error::CryptoError;
pub use kdf::KdfParams;
pub use sealed::{open, seal, SealedSecret};
pub use secret::SecretBytes;
