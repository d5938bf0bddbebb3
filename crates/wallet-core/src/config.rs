use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chain_api::{Chain, ChainFamily, ConfirmationPolicy, RetryPolicy, FEE_SUGGESTION_TTL_SECS};
use crypto_utils::KdfParams;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub networks: Vec<NetworkConfig>,
    pub retry: RetryPolicy,
    pub confirmation: ConfirmationPolicy,
    pub keystore: KdfParams,
    pub multisig: MultisigSettings,
    pub fees: FeeSettings,
}

impl Default for WalletConfig {
    /// Every mainnet family on its public endpoint.
    fn default() -> Self {
        Self {
            networks: [
                Chain::Ethereum,
                Chain::Bitcoin,
                Chain::Solana,
                Chain::Near,
                Chain::Ripple,
            ]
            .into_iter()
            .map(NetworkConfig::new)
            .collect(),
            retry: RetryPolicy::default(),
            confirmation: ConfirmationPolicy::default(),
            keystore: KdfParams::default(),
            multisig: MultisigSettings::default(),
            fees: FeeSettings::default(),
        }
    }
}

/// One node connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain: Chain,
    /// Falls back to the chain's public endpoint.
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// EVM account that submits Safe executions.
    #[serde(default)]
    pub relayer: Option<String>,
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl NetworkConfig {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            rpc_url: None,
            timeout_ms: default_timeout_ms(),
            relayer: None,
        }
    }

    pub fn url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| default_rpc_url(self.chain).to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultisigSettings {
    /// Proposals older than this expire. `None` keeps them open.
    pub proposal_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSettings {
    /// How long a fee suggestion is reused. Capped at the suggestion TTL.
    pub cache_ttl_secs: u64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self { cache_ttl_secs: 15 }
    }
}

/// Public endpoint for `chain`.
pub fn default_rpc_url(chain: Chain) -> &'static str {
    match chain.family() {
        ChainFamily::Evm => chain_eth::chains::default_rpc_url(chain).unwrap_or(""),
        ChainFamily::Bitcoin if chain.is_testnet() => chain_btc::network::TESTNET_ESPLORA,
        ChainFamily::Bitcoin => chain_btc::network::MAINNET_ESPLORA,
        ChainFamily::Solana if chain.is_testnet() => chain_sol::adapter::DEVNET_RPC,
        ChainFamily::Solana => chain_sol::adapter::MAINNET_RPC,
        ChainFamily::Near if chain.is_testnet() => chain_near::adapter::TESTNET_RPC,
        ChainFamily::Near => chain_near::adapter::MAINNET_RPC,
        ChainFamily::Ripple if chain.is_testnet() => chain_xrp::adapter::TESTNET_RPC,
        ChainFamily::Ripple => chain_xrp::adapter::MAINNET_RPC,
    }
}

impl WalletConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(content)
            .map_err(|err| WalletError::Config(format!("unable to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let content = fs::read_to_string(path)
            .map_err(|err| WalletError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, WalletError> {
        toml::to_string_pretty(self)
            .map_err(|err| WalletError::Config(format!("unable to encode config: {err}")))
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        let mut seen = HashSet::new();
        for network in &self.networks {
            if !seen.insert(network.chain) {
                return Err(WalletError::Config(format!(
                    "{} is configured twice",
                    network.chain
                )));
            }
            let url = network.url();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WalletError::Config(format!(
                    "{}: rpc_url must be an http(s) url, got {url:?}",
                    network.chain
                )));
            }
            if network.timeout_ms == 0 {
                return Err(WalletError::Config(format!(
                    "{}: timeout_ms must be positive",
                    network.chain
                )));
            }
            if network.relayer.is_some() && network.chain.family() != ChainFamily::Evm {
                return Err(WalletError::Config(format!(
                    "{}: relayer is only used by EVM chains",
                    network.chain
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(WalletError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.multisig.proposal_ttl_secs == Some(0) {
            return Err(WalletError::Config("multisig.proposal_ttl_secs must be positive".into()));
        }
        if self.fees.cache_ttl_secs > FEE_SUGGESTION_TTL_SECS as u64 {
            return Err(WalletError::Config(format!(
                "fees.cache_ttl_secs must not exceed {FEE_SUGGESTION_TTL_SECS}"
            )));
        }
        self.keystore
            .validate()
            .map_err(|err| WalletError::Config(format!("keystore: {err}")))
    }
}
