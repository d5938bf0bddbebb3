use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::adapter::ChainAdapter;
use crate::error::ChainError;
use crate::types::TxStatus;

/// How long to wait for one confirmation after broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            timeout_ms: 120_000,
        }
    }
}

impl ConfirmationPolicy {
    /// Checks the status once and returns.
    pub const fn no_wait() -> Self {
        Self {
            poll_interval_ms: 0,
            timeout_ms: 0,
        }
    }
}

/// Polls until the transaction is terminal or the timeout elapses.
///
/// Returns `Pending` on timeout; the caller can poll again later. Timeouts
/// of individual status calls are treated as "not yet known".
pub async fn await_confirmation(
    adapter: &dyn ChainAdapter,
    tx_hash: &str,
    policy: &ConfirmationPolicy,
) -> Result<TxStatus, ChainError> {
    let deadline = Instant::now() + Duration::from_millis(policy.timeout_ms);
    let interval = Duration::from_millis(policy.poll_interval_ms);

    loop {
        match adapter.transaction_status(tx_hash).await {
            Ok(status) if status.is_terminal() => {
                info!(chain = %adapter.chain(), tx_hash, ?status, "transaction finalized");
                return Ok(status);
            }
            Ok(_) => debug!(tx_hash, "still pending"),
            Err(ChainError::NetworkTimeout(msg)) => debug!(tx_hash, error = %msg, "status poll timed out"),
            Err(err) => return Err(err),
        }

        if Instant::now() + interval >= deadline {
            return Ok(TxStatus::Pending);
        }
        tokio::time::sleep(interval).await;
    }
}
