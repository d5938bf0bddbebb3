use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    retry_read, Chain, ChainError, Congestion, FeeEstimator, FeePriority, FeeSchedule,
    FeeSuggestion, NodeTransport, RetryPolicy,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Virtual size of one full block.
const BLOCK_VSIZE: f64 = 1_000_000.0;

/// Mempool backlog, in blocks, separating congestion levels.
const BACKLOG_CUTS: [f64; 3] = [5.0, 20.0, 60.0];

/// Esplora confirmation target used as the fee floor.
const FLOOR_TARGET_BLOCKS: &str = "144";

/// Minimum relay fee.
const MIN_RELAY_SAT_VB: u128 = 1;

pub fn default_schedule() -> FeeSchedule {
    FeeSchedule {
        unit: "sat/vB",
        tier_fees: [1, 3, 6, 12],
        congestion_multipliers: [1000, 1500, 2500, 4000],
        tier_confirmation_secs: [3600, 1800, 1200, 600],
        congestion_delays: [1000, 1500, 2500, 4000],
    }
}

/// Fee estimator backed by Esplora's `/fee-estimates` and `/mempool`.
pub struct BtcFeeEstimator {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    schedule: FeeSchedule,
    retry: RetryPolicy,
}

impl BtcFeeEstimator {
    pub fn new(chain: Chain, transport: Arc<dyn NodeTransport>, retry: RetryPolicy) -> Self {
        Self {
            chain,
            transport,
            schedule: default_schedule(),
            retry,
        }
    }

    pub fn with_schedule(mut self, schedule: FeeSchedule) -> Result<Self, ChainError> {
        schedule.validate()?;
        self.schedule = schedule;
        Ok(self)
    }

    async fn get(&self, path: &'static str) -> Result<Value, ChainError> {
        retry_read(&self.retry, path, || async {
            self.transport.get_json(path).await.map_err(ChainError::from)
        })
        .await
    }

    /// Pending mempool size in blocks.
    pub async fn mempool_backlog(&self) -> Result<f64, ChainError> {
        let mempool = self.get("mempool").await?;
        let vsize = mempool["vsize"]
            .as_f64()
            .ok_or_else(|| ChainError::Decode("mempool: missing vsize".into()))?;
        Ok(vsize / BLOCK_VSIZE)
    }

    /// Slowest-target estimate from Esplora, never below the relay minimum.
    async fn floor(&self) -> Result<u128, ChainError> {
        let estimates = self.get("fee-estimates").await?;
        let rate = estimates[FLOOR_TARGET_BLOCKS]
            .as_f64()
            .or_else(|| {
                estimates
                    .as_object()
                    .and_then(|m| m.values().filter_map(Value::as_f64).reduce(f64::min))
            })
            .ok_or_else(|| ChainError::Decode("fee-estimates: no estimates".into()))?;
        Ok((rate.ceil() as u128).max(MIN_RELAY_SAT_VB))
    }
}

#[async_trait]
impl FeeEstimator for BtcFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        match self.mempool_backlog().await {
            Ok(blocks) => {
                debug!(chain = %self.chain, blocks, "mempool backlog");
                Congestion::from_ratio(blocks, BACKLOG_CUTS)
            }
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "mempool unavailable, assuming medium congestion");
                Congestion::Medium
            }
        }
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        let congestion = self.congestion().await;
        let floor = match self.floor().await {
            Ok(floor) => floor,
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "fee estimates unavailable, using relay minimum");
                MIN_RELAY_SAT_VB
            }
        };
        Ok(self.schedule.suggest(self.chain, priority, congestion, floor))
    }
}
