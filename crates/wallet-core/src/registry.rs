use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chain_api::{
    Chain, ChainAdapter, ChainError, ChainFamily, FeeEstimator, FeePriority, FeeSuggestion,
    HttpTransport, NodeTransport, RetryPolicy, FEE_SUGGESTION_TTL_SECS,
};
use chain_btc::{BtcAdapter, BtcFeeEstimator};
use chain_eth::{EvmAdapter, EvmFeeEstimator};
use chain_near::NearAdapter;
use chain_sol::SolAdapter;
use chain_xrp::XrpAdapter;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{NetworkConfig, WalletConfig};
use crate::error::WalletError;

struct Handler {
    adapter: Arc<dyn ChainAdapter>,
    fees: Arc<dyn FeeEstimator>,
}

/// Chain → adapter and fee estimator, one node connection per chain.
///
/// Handlers are fixed after construction and shared read-only; only the fee
/// cache is mutable.
pub struct HandlerRegistry {
    handlers: HashMap<Chain, Handler>,
    fee_cache: RwLock<HashMap<(Chain, FeePriority), FeeSuggestion>>,
    fee_cache_ttl: chrono::Duration,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fee_cache: RwLock::new(HashMap::new()),
            fee_cache_ttl: chrono::Duration::seconds(15),
        }
    }

    /// Connects every configured network.
    pub fn from_config(config: &WalletConfig) -> Result<Self, WalletError> {
        config.validate()?;
        let mut registry = Self::new().with_fee_cache_ttl(config.fees.cache_ttl_secs);
        for network in &config.networks {
            let (adapter, fees) = connect(network, config.retry)?;
            registry.register(adapter, fees)?;
        }
        info!(chains = registry.handlers.len(), "handler registry ready");
        Ok(registry)
    }

    /// Reuse window for fee suggestions; never longer than their TTL.
    pub fn with_fee_cache_ttl(mut self, secs: u64) -> Self {
        let secs = i64::try_from(secs)
            .unwrap_or(FEE_SUGGESTION_TTL_SECS)
            .min(FEE_SUGGESTION_TTL_SECS);
        self.fee_cache_ttl = chrono::Duration::seconds(secs);
        self
    }

    pub fn register(
        &mut self,
        adapter: Arc<dyn ChainAdapter>,
        fees: Arc<dyn FeeEstimator>,
    ) -> Result<(), WalletError> {
        let chain = adapter.chain();
        if fees.chain() != chain {
            return Err(WalletError::Config(format!(
                "fee estimator for {} registered with {chain} adapter",
                fees.chain()
            )));
        }
        if self.handlers.insert(chain, Handler { adapter, fees }).is_some() {
            return Err(WalletError::Config(format!("{chain} registered twice")));
        }
        debug!(%chain, "handler registered");
        Ok(())
    }

    pub fn with_handler(
        mut self,
        adapter: Arc<dyn ChainAdapter>,
        fees: Arc<dyn FeeEstimator>,
    ) -> Result<Self, WalletError> {
        self.register(adapter, fees)?;
        Ok(self)
    }

    pub fn adapter(&self, chain: Chain) -> Result<Arc<dyn ChainAdapter>, WalletError> {
        self.handlers
            .get(&chain)
            .map(|h| h.adapter.clone())
            .ok_or_else(|| WalletError::UnsupportedChain(format!("{chain} is not configured")))
    }

    pub fn fee_estimator(&self, chain: Chain) -> Result<Arc<dyn FeeEstimator>, WalletError> {
        self.handlers
            .get(&chain)
            .map(|h| h.fees.clone())
            .ok_or_else(|| WalletError::UnsupportedChain(format!("{chain} is not configured")))
    }

    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.handlers.keys().copied().collect();
        chains.sort();
        chains
    }

    /// Fee suggestion for `priority`, served from cache while fresh.
    pub async fn estimate_fee(
        &self,
        chain: Chain,
        priority: FeePriority,
    ) -> Result<FeeSuggestion, WalletError> {
        let estimator = self.fee_estimator(chain)?;
        let now = Utc::now();
        if let Some(cached) = self.fee_cache.read().await.get(&(chain, priority)) {
            if now - cached.computed_at < self.fee_cache_ttl && !cached.is_stale(now) {
                return Ok(cached.clone());
            }
        }

        let suggestion = estimator.estimate_fee(priority).await?;
        debug!(
            %chain,
            ?priority,
            congestion = ?suggestion.congestion,
            fee = %suggestion.fee_per_unit,
            unit = %suggestion.unit,
            "fee estimated"
        );
        self.fee_cache
            .write()
            .await
            .insert((chain, priority), suggestion.clone());
        Ok(suggestion)
    }
}

fn connect(
    network: &NetworkConfig,
    retry: RetryPolicy,
) -> Result<(Arc<dyn ChainAdapter>, Arc<dyn FeeEstimator>), WalletError> {
    let chain = network.chain;
    let url = network.url();
    let transport: Arc<dyn NodeTransport> = Arc::new(
        HttpTransport::new(url.as_str(), Duration::from_millis(network.timeout_ms))
            .map_err(ChainError::from)?,
    );
    info!(%chain, endpoint = %url, "connecting");

    let handler: (Arc<dyn ChainAdapter>, Arc<dyn FeeEstimator>) = match chain.family() {
        ChainFamily::Evm => {
            let mut adapter = EvmAdapter::new(chain, transport.clone(), retry)?;
            if let Some(relayer) = &network.relayer {
                adapter = adapter.with_relayer(relayer)?;
            }
            (
                Arc::new(adapter),
                Arc::new(EvmFeeEstimator::new(chain, transport, retry)),
            )
        }
        ChainFamily::Bitcoin => (
            Arc::new(BtcAdapter::new(chain, transport.clone(), retry)?),
            Arc::new(BtcFeeEstimator::new(chain, transport, retry)),
        ),
        ChainFamily::Solana => {
            let adapter = SolAdapter::new(chain, transport, retry)?;
            let fees = adapter.fee_estimator();
            (Arc::new(adapter), Arc::new(fees))
        }
        ChainFamily::Near => {
            let adapter = NearAdapter::new(chain, transport, retry)?;
            let fees = adapter.fee_estimator();
            (Arc::new(adapter), Arc::new(fees))
        }
        ChainFamily::Ripple => {
            let adapter = XrpAdapter::new(chain, transport, retry)?;
            let fees = adapter.fee_estimator();
            (Arc::new(adapter), Arc::new(fees))
        }
    };
    Ok(handler)
}
