//! NEAR Protocol support for the wallet.
//!
//! Implicit and named account ids, a hand-written borsh encoding of
//! transfer and function-call transactions, NEP-141/171/245 token calls,
//! tagged message signing, gas-price based fee estimation and a
//! [`NearAdapter`] speaking the NEAR JSON-RPC.

pub mod account;
pub mod adapter;
pub mod error;
pub mod fees;
pub mod message;
pub mod transaction;

pub use adapter::NearAdapter;
pub use error::NearError;
pub use fees::NearFeeEstimator;
