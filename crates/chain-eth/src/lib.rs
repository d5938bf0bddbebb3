//! EVM chain support for the wallet.
//!
//! This crate provides:
//! - address derivation from secp256k1 public keys (with EIP-55 checksums)
//! - EIP-1559 transaction building and signing
//! - token transfer encoding for ERC-20, ERC-721, ERC-1155 and partitioned tokens
//! - EIP-191 and EIP-712 message hashing and signature recovery
//! - Safe multisig proposals and execution
//! - fee estimation from `eth_feeHistory`
//! - an [`EvmAdapter`] implementing [`chain_api::ChainAdapter`]

pub mod abi;
pub mod adapter;
pub mod address;
pub mod chains;
pub mod error;
pub mod fees;
pub mod message;
mod rpc;
pub mod safe;
pub mod tokens;
pub mod transaction;
pub mod typed_data;

pub use adapter::EvmAdapter;
pub use error::EthError;
pub use fees::EvmFeeEstimator;
