use std::sync::Arc;

use async_trait::async_trait;
use chain_api::{
    retry_read, Chain, ChainError, Congestion, FeeEstimator, FeePriority, FeeSchedule,
    FeeSuggestion, NodeTransport, RetryPolicy,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Reference transaction cost when the node cannot be asked.
pub const BASE_FEE_DROPS: u128 = 10;

/// Server load factor; 1 on an idle network.
const LOAD_CUTS: [f64; 3] = [1.5, 4.0, 16.0];

pub fn default_schedule() -> FeeSchedule {
    FeeSchedule {
        unit: "drops",
        tier_fees: [0, 2, 10, 50],
        congestion_multipliers: [1000, 2000, 5000, 10000],
        tier_confirmation_secs: [12, 8, 5, 4],
        congestion_delays: [1000, 1500, 3000, 6000],
    }
}

fn drops_field(value: &Value) -> Option<u128> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    }
}

pub struct XrpFeeEstimator {
    chain: Chain,
    transport: Arc<dyn NodeTransport>,
    schedule: FeeSchedule,
    retry: RetryPolicy,
}

impl XrpFeeEstimator {
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

    async fn read(&self, method: &'static str) -> Result<Value, ChainError> {
        retry_read(&self.retry, method, || async {
            self.transport
                .rpc(method, json!([{}]))
                .await
                .map_err(ChainError::from)
        })
        .await
    }

    /// `server_info.load_factor`.
    pub async fn load_factor(&self) -> Result<f64, ChainError> {
        let result = self.read("server_info").await?;
        result["info"]["load_factor"]
            .as_f64()
            .ok_or_else(|| ChainError::Decode("server_info: missing load_factor".into()))
    }

    /// Cost to get into the open ledger right now, never below the base fee.
    pub async fn open_ledger_fee(&self) -> Result<u128, ChainError> {
        let result = self.read("fee").await?;
        let drops = &result["drops"];
        let open = drops_field(&drops["open_ledger_fee"])
            .ok_or_else(|| ChainError::Decode("fee: missing open_ledger_fee".into()))?;
        let base = drops_field(&drops["base_fee"]).unwrap_or(BASE_FEE_DROPS);
        Ok(open.max(base))
    }
}

#[async_trait]
impl FeeEstimator for XrpFeeEstimator {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn congestion(&self) -> Congestion {
        match self.load_factor().await {
            Ok(load) => {
                debug!(chain = %self.chain, load, "server load factor");
                Congestion::from_ratio(load, LOAD_CUTS)
            }
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "load factor unavailable, assuming medium congestion");
                Congestion::Medium
            }
        }
    }

    async fn estimate_fee(&self, priority: FeePriority) -> Result<FeeSuggestion, ChainError> {
        let congestion = self.congestion().await;
        let floor = match self.open_ledger_fee().await {
            Ok(fee) => fee,
            Err(err) => {
                warn!(chain = %self.chain, error = %err, "open ledger fee unavailable, using base fee");
                BASE_FEE_DROPS
            }
        };
        Ok(self.schedule.suggest(self.chain, priority, congestion, floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_api::mock::MockTransport;
    use chain_api::TransportError;

    fn estimator(t: Arc<MockTransport>) -> XrpFeeEstimator {
        XrpFeeEstimator::new(Chain::RippleTestnet, t, RetryPolicy::none())
    }

    #[test]
    fn schedule_is_valid() {
        default_schedule().validate().unwrap();
    }

    #[tokio::test]
    async fn idle_network() {
        let t = Arc::new(MockTransport::new());
        t.push("server_info", json!({"info": {"load_factor": 1, "build_version": "2.2.0"}}));
        t.push("fee", json!({"drops": {"base_fee": "10", "median_fee": "5000", "minimum_fee": "10", "open_ledger_fee": "10"}}));
        let e = estimator(t);
        let low = e.estimate_fee(FeePriority::Low).await.unwrap();
        assert_eq!(low.congestion, Congestion::Low);
        assert_eq!(low.fee_per_unit, 10);
        assert_eq!(low.unit, "drops");
        let urgent = e.estimate_fee(FeePriority::Urgent).await.unwrap();
        assert_eq!(urgent.fee_per_unit, 60);
        assert!(urgent.estimated_confirmation_secs < low.estimated_confirmation_secs);
    }

    #[tokio::test]
    async fn loaded_network_escalates() {
        let t = Arc::new(MockTransport::new());
        t.push("server_info", json!({"info": {"load_factor": 20.5}}));
        t.push("fee", json!({"drops": {"base_fee": "10", "open_ledger_fee": "2560"}}));
        let e = estimator(t);
        let medium = e.estimate_fee(FeePriority::Medium).await.unwrap();
        assert_eq!(medium.congestion, Congestion::VeryHigh);
        assert_eq!(medium.fee_per_unit, 2560 + 20);
    }

    #[tokio::test]
    async fn signal_failure_degrades_to_medium() {
        let t = Arc::new(MockTransport::new());
        t.push_error("server_info", TransportError::Timeout("slow".into()));
        t.push_error("fee", TransportError::Timeout("slow".into()));
        let e = estimator(t);
        let s = e.estimate_fee(FeePriority::High).await.unwrap();
        assert_eq!(s.congestion, Congestion::Medium);
        assert_eq!(s.fee_per_unit, BASE_FEE_DROPS + 20);
    }
}
