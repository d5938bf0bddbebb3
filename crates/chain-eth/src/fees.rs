use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    retry_read, Chain, ChainError, Congestion, FeeEstimator, FeePriority, FeeSchedule,
    FeeSuggestion, NodeTransport, RetryPolicy,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::rpc::{quantity, quantity_u128};

/// Blocks sampled by `eth_feeHistory`.
pub const FEE_HISTORY_BLOCKS: u64 = 10;

/// Cut points over the mean gas-used ratio (target is 0.5).
const CONGESTION_CUTS: [f64; 3] = [0.3, 0.55, 0.8];

/// Priority tips in wei per gas, per tier.
pub fn default_schedule() -> FeeSchedule {
    FeeSchedule {
        unit: "wei/gas",
        tier_fees: [500_000_000, 1_000_000_000, 2_000_000_000, 4_000_000_000],
        congestion_multipliers: [1000, 1250, 1600, 2200],
        tier_confirmation_secs: [180, 60, 24, 12],
        congestion_delays: [1000, 1500, 2500, 4000],
    }
}

/// Snapshot of the EIP-1559 fee market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeMarket {
    /// Base fee of the next block.
    pub base_fee: u128,
    pub gas_used_ratio: f64,
}

impl FeeMarket {
    pub fn congestion(&self) -> Congestion {
        Congestion::from_ratio(self.gas_used_ratio, CONGESTION_CUTS)
    }
}

/// EIP-1559 fee estimator driven by `eth_feeHistory`.
#[derive(Clone)]
pub struct EvmFeeEstimator {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    schedule: FeeSchedule,
    retry: RetryPolicy,
}

impl EvmFeeEstimator {
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

    pub async fn fee_market(&self) -> Result<FeeMarket, ChainError> {
        let history = retry_read(&self.retry, "eth_feeHistory", || async {
            self.transport
                .rpc(
                    "eth_feeHistory",
                    json!([quantity(FEE_HISTORY_BLOCKS), "latest", []]),
                )
                .await
                .map_err(ChainError::from)
        })
        .await?;

        let base_fee = history["baseFeePerGas"]
            .as_array()
            .and_then(|fees| fees.last())
            .ok_or_else(|| ChainError::Decode("eth_feeHistory: no baseFeePerGas".into()))?;
        let base_fee = quantity_u128(base_fee, "baseFeePerGas")?;

        let ratios: Vec<f64> = history["gasUsedRatio"]
            .as_array()
            .map(|r| r.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();
        if ratios.is_empty() {
            return Err(ChainError::Decode("eth_feeHistory: no gasUsedRatio".into()));
        }
        let gas_used_ratio = ratios.iter().sum::<f64>() / ratios.len() as f64;

        debug!(chain = %self.chain, base_fee, gas_used_ratio, "fee market");
        Ok(FeeMarket {
            base_fee,
            gas_used_ratio,
        })
    }

    /// `(max_priority_fee_per_gas, max_fee_per_gas)` for a transaction.
    ///
    /// The max fee leaves room for the base fee to double.
    pub fn eip1559_fees(&self, market: &FeeMarket, priority: FeePriority) -> (u128, u128) {
        let tip = self.schedule.fee_for(priority, market.congestion(), 0);
        let max_fee = market.base_fee.saturating_mul(2).saturating_add(tip);
        (tip, max_fee)
    }

    async fn fallback_base_fee(&self) -> Result<u128, ChainError> {
        let price = self.transport.rpc("eth_gasPrice", json!([])).await?;
        quantity_u128(&price, "eth_gasPrice")
    }
}

#[async_trait]
impl FeeEstimator for EvmFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        match self.fee_market().await {
            Ok(market) => market.congestion(),
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "fee history unavailable, assuming medium congestion");
                Congestion::Medium
            }
        }
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        let (base_fee, congestion) = match self.fee_market().await {
            Ok(market) => (market.base_fee, market.congestion()),
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "fee history unavailable, using eth_gasPrice");
                (self.fallback_base_fee().await?, Congestion::Medium)
            }
        };
        Ok(self.schedule.suggest(self.chain, priority, congestion, base_fee))
    }
}
