//! # chain-api
//!
//! The uniform contract every protocol driver implements, plus the pieces
//! the drivers share: chain identity, node transport, read retry,
//! confirmation polling and fee schedule math.

pub mod adapter;
pub mod chain;
pub mod confirm;
pub mod error;
pub mod fees;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use adapter::{ChainAdapter, FeeEstimator};
pub use chain::{Chain, ChainFamily, CurveType};
pub use confirm::{await_confirmation, ConfirmationPolicy};
pub use error::{ChainError, TransportError};
pub use fees::{Congestion, FeePriority, FeeSchedule, FeeSuggestion, FEE_SUGGESTION_TTL_SECS};
pub use retry::{retry_read, RetryPolicy};
pub use transport::{HttpTransport, NodeTransport};
pub use types::{
    parse_base_units, ApprovalRequest, MessageEncoding, MultisigConfig, SignableMessage, SignatureWithSigner,
    TokenStandard, TokenTransfer, TxStatus,
};
