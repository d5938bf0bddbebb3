use chain_api::{Chain, ChainFamily};

/// Public endpoints for an EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmNetwork {
    pub chain: Chain,
    pub chain_id: u64,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
}

const NETWORKS: &[EvmNetwork] = &[
    EvmNetwork {
        chain: Chain::Ethereum,
        chain_id: 1,
        rpc_url: "https://eth.llamarpc.com",
        explorer_url: "https://etherscan.io",
    },
    EvmNetwork {
        chain: Chain::Polygon,
        chain_id: 137,
        rpc_url: "https://polygon-rpc.com",
        explorer_url: "https://polygonscan.com",
    },
    EvmNetwork {
        chain: Chain::Arbitrum,
        chain_id: 42161,
        rpc_url: "https://arb1.arbitrum.io/rpc",
        explorer_url: "https://arbiscan.io",
    },
    EvmNetwork {
        chain: Chain::Base,
        chain_id: 8453,
        rpc_url: "https://mainnet.base.org",
        explorer_url: "https://basescan.org",
    },
    EvmNetwork {
        chain: Chain::Optimism,
        chain_id: 10,
        rpc_url: "https://mainnet.optimism.io",
        explorer_url: "https://optimistic.etherscan.io",
    },
    EvmNetwork {
        chain: Chain::Bsc,
        chain_id: 56,
        rpc_url: "https://bsc-dataseed.binance.org",
        explorer_url: "https://bscscan.com",
    },
    EvmNetwork {
        chain: Chain::Avalanche,
        chain_id: 43114,
        rpc_url: "https://api.avax.network/ext/bc/C/rpc",
        explorer_url: "https://snowtrace.io",
    },
    EvmNetwork {
        chain: Chain::Sepolia,
        chain_id: 11155111,
        rpc_url: "https://rpc.sepolia.org",
        explorer_url: "https://sepolia.etherscan.io",
    },
    EvmNetwork {
        chain: Chain::PolygonAmoy,
        chain_id: 80002,
        rpc_url: "https://rpc-amoy.polygon.technology",
        explorer_url: "https://amoy.polygonscan.com",
    },
];

/// Network definition for an EVM chain, `None` for other families.
pub fn network(chain: Chain) -> Option<&'static EvmNetwork> {
    NETWORKS.iter().find(|n| n.chain == chain)
}

pub fn default_rpc_url(chain: Chain) -> Option<&'static str> {
    network(chain).map(|n| n.rpc_url)
}

pub fn is_evm(chain: Chain) -> bool {
    chain.family() == ChainFamily::Evm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_evm_chain_has_a_network() {
        for chain in Chain::ALL.into_iter().filter(|c| is_evm(*c)) {
            let net = network(chain).unwrap_or_else(|| panic!("{chain} missing"));
            assert_eq!(Some(net.chain_id), chain.evm_chain_id());
            assert!(net.rpc_url.starts_with("https://"));
            assert!(net.explorer_url.starts_with("https://"));
        }
    }

    #[test]
    fn non_evm_chains_have_none() {
        assert!(network(Chain::Bitcoin).is_none());
        assert!(default_rpc_url(Chain::Solana).is_none());
    }
}
