//! Bitcoin chain support for the wallet.
//!
//! Provides P2WPKH address derivation, UTXO coin selection, transaction
//! building and signing using native SegWit (bech32) conventions, fee
//! estimation and a [`BtcAdapter`] over an Esplora REST endpoint.

pub mod adapter;
pub mod address;
pub mod error;
pub mod fees;
pub mod network;
pub mod transaction;
pub mod utxo;

pub use adapter::BtcAdapter;
pub use error::BtcError;
pub use fees::BtcFeeEstimator;
pub use network::BtcNetwork;
