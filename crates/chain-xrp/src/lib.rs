//! XRP Ledger support for the wallet.
//!
//! Classic `r...` addresses, the subset of the XRPL binary codec a Payment
//! needs (native drops and issued-currency amounts), secp256k1 signing with
//! the `STX` hash prefix, load-factor fee estimation and an [`XrpAdapter`]
//! over the rippled JSON-RPC.

pub mod adapter;
pub mod address;
pub mod amount;
pub mod codec;
pub mod error;
pub mod fees;
pub mod signing;

pub use adapter::XrpAdapter;
pub use error::XrpError;
pub use fees::XrpFeeEstimator;
