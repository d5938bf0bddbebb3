//! Solana chain support for the wallet.
//!
//! Address derivation, a hand-built legacy transaction wire format, SPL
//! token transfers, off-chain message signing, fee estimation and a
//! [`SolAdapter`], all without `solana-sdk`. Signing uses `ed25519-dalek`
//! and addresses use `bs58`.

pub mod adapter;
pub mod address;
pub mod error;
pub mod fees;
pub mod message;
pub mod spl_token;
pub mod transaction;

pub use adapter::SolAdapter;
pub use error::SolError;
pub use fees::SolFeeEstimator;
