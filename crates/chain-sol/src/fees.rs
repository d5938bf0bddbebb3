use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    retry_read, Chain, ChainError, Congestion, FeeEstimator, FeePriority, FeeSchedule,
    FeeSuggestion, NodeTransport, RetryPolicy,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Base fee charged per signature.
pub const LAMPORTS_PER_SIGNATURE: u128 = 5_000;

/// Sustained throughput treated as full capacity.
const CAPACITY_TPS: f64 = 4_000.0;

const TPS_CUTS: [f64; 3] = [0.4, 0.65, 0.85];

const PERFORMANCE_SAMPLES: u64 = 5;

pub fn default_schedule() -> FeeSchedule {
    FeeSchedule {
        unit: "lamports/signature",
        tier_fees: [0, 1_000, 5_000, 20_000],
        congestion_multipliers: [1000, 1500, 3000, 6000],
        tier_confirmation_secs: [20, 8, 4, 2],
        congestion_delays: [1000, 1250, 2000, 3000],
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceSample {
    num_transactions: u64,
    sample_period_secs: u64,
}

pub struct SolFeeEstimator {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    schedule: FeeSchedule,
    retry: RetryPolicy,
}

impl SolFeeEstimator {
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

    /// Average transactions per second over the recent samples.
    pub async fn recent_tps(&self) -> Result<f64, ChainError> {
        let raw = retry_read(&self.retry, "getRecentPerformanceSamples", || async {
            self.transport
                .rpc("getRecentPerformanceSamples", json!([PERFORMANCE_SAMPLES]))
                .await
                .map_err(ChainError::from)
        })
        .await?;
        let samples: Vec<PerformanceSample> = serde_json::from_value(raw)
            .map_err(|e| ChainError::Decode(format!("performance samples: {e}")))?;
        let (txs, secs) = samples.iter().fold((0u64, 0u64), |(t, s), sample| {
            (t + sample.num_transactions, s + sample.sample_period_secs)
        });
        if secs == 0 {
            return Err(ChainError::Decode("performance samples: empty period".into()));
        }
        Ok(txs as f64 / secs as f64)
    }
}

#[async_trait]
impl FeeEstimator for SolFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        match self.recent_tps().await {
            Ok(tps) => {
                debug!(chain = %self.chain, tps, "recent throughput");
                Congestion::from_ratio(tps / CAPACITY_TPS, TPS_CUTS)
            }
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "performance samples unavailable, assuming medium congestion");
                Congestion::Medium
            }
        }
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        let congestion = self.congestion().await;
        Ok(self
            .schedule
            .suggest(self.chain, priority, congestion, LAMPORTS_PER_SIGNATURE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_api::mock::MockTransport;
    use chain_api::TransportError;

    fn samples(tx_per_min: u64) -> serde_json::Value {
        json!([
            {"slot": 10, "numTransactions": tx_per_min, "numSlots": 150, "samplePeriodSecs": 60},
            {"slot": 9, "numTransactions": tx_per_min, "numSlots": 150, "samplePeriodSecs": 60},
        ])
    }

    #[tokio::test]
    async fn throughput_ratio_drives_congestion() {
        let t = Arc::new(MockTransport::new());
        t.push("getRecentPerformanceSamples", samples(60 * 1_000));
        let est = SolFeeEstimator::new(Chain::Solana, t, RetryPolicy::none());
        assert_eq!(est.congestion().await, Congestion::Low);

        let t = Arc::new(MockTransport::new());
        t.push("getRecentPerformanceSamples", samples(60 * 3_800));
        let est = SolFeeEstimator::new(Chain::Solana, t, RetryPolicy::none());
        assert_eq!(est.congestion().await, Congestion::VeryHigh);
    }

    #[tokio::test]
    async fn low_priority_pays_base_fee() {
        let t = Arc::new(MockTransport::new());
        t.push_error("getRecentPerformanceSamples", TransportError::Timeout("5s".into()));
        let est = SolFeeEstimator::new(Chain::Solana, t, RetryPolicy::none());
        let s = est.estimate_fee(FeePriority::Low).await.unwrap();
        assert_eq!(s.congestion, Congestion::Medium);
        assert_eq!(s.fee_per_unit, LAMPORTS_PER_SIGNATURE);
        assert_eq!(s.unit, "lamports/signature");
    }
}
