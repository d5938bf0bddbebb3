use bitcoin::Network;
use chain_api::{Chain, ChainError};

/// Default Esplora endpoint for Bitcoin mainnet.
pub const MAINNET_ESPLORA: &str = "https://blockstream.info/api";

/// Default Esplora endpoint for Bitcoin testnet.
pub const TESTNET_ESPLORA: &str = "https://blockstream.info/testnet/api";

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
}

impl BtcNetwork {
    pub fn from_chain(chain: Chain) -> Result<Self, ChainError> {
        match chain {
            Chain::Bitcoin => Ok(BtcNetwork::Mainnet),
            Chain::BitcoinTestnet => Ok(BtcNetwork::Testnet),
            other => Err(ChainError::UnsupportedChain(format!(
                "{other} is not a bitcoin network"
            ))),
        }
    }

    pub fn chain(self) -> Chain {
        match self {
            BtcNetwork::Mainnet => Chain::Bitcoin,
            BtcNetwork::Testnet => Chain::BitcoinTestnet,
        }
    }

    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
        }
    }

    pub fn default_esplora_url(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_ESPLORA,
            BtcNetwork::Testnet => TESTNET_ESPLORA,
        }
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_wallet_chains() {
        assert_eq!(BtcNetwork::from_chain(Chain::Bitcoin).unwrap(), BtcNetwork::Mainnet);
        assert_eq!(
            BtcNetwork::from_chain(Chain::BitcoinTestnet).unwrap(),
            BtcNetwork::Testnet
        );
        assert!(BtcNetwork::from_chain(Chain::Ethereum).is_err());
        assert_eq!(BtcNetwork::Testnet.chain(), Chain::BitcoinTestnet);
    }

    #[test]
    fn converts_to_bitcoin_network() {
        assert_eq!(BtcNetwork::Mainnet.to_bitcoin_network(), Network::Bitcoin);
        assert_eq!(BtcNetwork::Testnet.to_bitcoin_network(), Network::Testnet);
    }

    #[test]
    fn display_names() {
        assert_eq!(BtcNetwork::Mainnet.to_string(), "mainnet");
        assert_eq!(BtcNetwork::Testnet.to_string(), "testnet");
    }
}
