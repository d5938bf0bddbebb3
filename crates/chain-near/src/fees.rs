use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    retry_read, Chain, ChainError, Congestion, FeeEstimator, FeePriority, FeeSchedule,
    FeeSuggestion, NodeTransport, RetryPolicy,
};
use serde_json::json;
use tracing::{debug, warn};

/// Protocol minimum gas price in yoctoNEAR per gas unit.
pub const MIN_GAS_PRICE: u128 = 100_000_000;

/// Gas price over the protocol minimum; the price rises only under load.
const PRICE_CUTS: [f64; 3] = [1.05, 1.5, 3.0];

/// NEAR has no priority fee market, so the tiers only pad the quoted price
/// against a rise between quoting and inclusion.
pub fn default_schedule() -> FeeSchedule {
    FeeSchedule {
        unit: "yocto/gas",
        tier_fees: [0, 10_000_000, 25_000_000, 50_000_000],
        congestion_multipliers: [1000, 1200, 1500, 2000],
        tier_confirmation_secs: [3, 2, 2, 1],
        congestion_delays: [1000, 1000, 1500, 2000],
    }
}

pub struct NearFeeEstimator {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    schedule: FeeSchedule,
    retry: RetryPolicy,
}

impl NearFeeEstimator {
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

    /// Current gas price of the latest block.
    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let result = retry_read(&self.retry, "gas_price", || async {
            self.transport
                .rpc("gas_price", json!([null]))
                .await
                .map_err(ChainError::from)
        })
        .await?;
        result["gas_price"]
            .as_str()
            .and_then(|s| s.parse::<u128>().ok())
            .ok_or_else(|| ChainError::Decode("gas_price: missing gas_price".into()))
    }
}

#[async_trait]
impl FeeEstimator for NearFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        match self.gas_price().await {
            Ok(price) => {
                debug!(chain = %self.chain, gas_price = %price, "gas price");
                Congestion::from_ratio(price as f64 / MIN_GAS_PRICE as f64, PRICE_CUTS)
            }
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "gas price unavailable, assuming medium congestion");
                Congestion::Medium
            }
        }
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        let floor = match self.gas_price().await {
            Ok(price) => price.max(MIN_GAS_PRICE),
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "gas price unavailable, quoting protocol minimum");
                MIN_GAS_PRICE
            }
        };
        let congestion = Congestion::from_ratio(floor as f64 / MIN_GAS_PRICE as f64, PRICE_CUTS);
        Ok(self.schedule.suggest(self.chain, priority, congestion, floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_api::mock::MockTransport;
    use chain_api::TransportError;

    fn estimator(t: Arc<MockTransport>) -> NearFeeEstimator {
        NearFeeEstimator::new(Chain::NearTestnet, t, RetryPolicy::none())
    }

    #[test]
    fn schedule_is_valid() {
        default_schedule().validate().unwrap();
    }

    #[tokio::test]
    async fn minimum_price_is_low_congestion() {
        let t = Arc::new(MockTransport::new());
        t.push("gas_price", json!({"gas_price": "100000000"}));
        let e = estimator(t);
        assert_eq!(e.congestion().await, Congestion::Low);

        let low = e.estimate_fee(FeePriority::Low).await.unwrap();
        assert_eq!(low.fee_per_unit, MIN_GAS_PRICE);
        assert_eq!(low.unit, "yocto/gas");
        let urgent = e.estimate_fee(FeePriority::Urgent).await.unwrap();
        assert_eq!(urgent.fee_per_unit, MIN_GAS_PRICE + 50_000_000);
    }

    #[tokio::test]
    async fn elevated_price_raises_congestion() {
        let t = Arc::new(MockTransport::new());
        t.push("gas_price", json!({"gas_price": "400000000"}));
        let e = estimator(t);
        assert_eq!(e.congestion().await, Congestion::VeryHigh);
        let medium = e.estimate_fee(FeePriority::Medium).await.unwrap();
        assert_eq!(medium.congestion, Congestion::VeryHigh);
        assert_eq!(medium.fee_per_unit, 400_000_000 + 20_000_000);
    }

    #[tokio::test]
    async fn node_failure_degrades() {
        let t = Arc::new(MockTransport::new());
        t.push_error("gas_price", TransportError::Connection("refused".into()));
        let e = estimator(t);
        assert_eq!(e.congestion().await, Congestion::Medium);
        assert_eq!(e.estimate_fee(FeePriority::Low).await.unwrap().fee_per_unit, MIN_GAS_PRICE);
    }
}
