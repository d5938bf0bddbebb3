//! Multi-chain wallet orchestration.
//!
//! [`WalletManager`] is the entry point: it owns the wallet and transaction
//! stores, opens keys through a [`KeyCustody`] backend, and dispatches to
//! per-chain adapters held by the [`HandlerRegistry`]. Multi-Signature
//! wallets route sends through the [`MultisigCoordinator`].

pub mod audit;
pub mod config;
pub mod error;
pub mod hd_derivation;
pub mod keystore;
pub mod manager;
pub mod mnemonic;
pub mod multisig;
pub mod registry;
pub mod signer;
pub mod store;
pub mod telemetry;
pub mod types;

pub use audit::{AuditEvent, AuditSink, AuditStatus, MemoryAuditSink, TracingAuditSink};
pub use config::{FeeSettings, MultisigSettings, NetworkConfig, WalletConfig};
pub use error::WalletError;
pub use keystore::{KeyCustody, LocalKeystore, SealedKey};
pub use manager::{CreatedWallet, WalletManager};
pub use multisig::{MultisigCoordinator, Proposal, ProposalState};
pub use registry::HandlerRegistry;
pub use signer::{MessageSigner, MultiSigner, ThresholdVerification, Verification};
pub use store::{MemoryTransactionStore, MemoryWalletStore, TransactionStore, WalletStore};
pub use telemetry::init_tracing;
pub use types::{SendOutcome, SendRequest, TransactionRecord, Wallet, WalletKind};

pub use chain_api::{
    Chain, ChainFamily, Congestion, FeePriority, FeeSuggestion, MessageEncoding, SignableMessage,
    SignatureWithSigner, TokenStandard, TokenTransfer, TxStatus,
};
