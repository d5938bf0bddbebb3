use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Ethereum,
    Polygon,
    Arbitrum,
    Base,
    Optimism,
    Bsc,
    Avalanche,
    Bitcoin,
    Solana,
    Near,
    Ripple,
    // Testnets
    Sepolia,
    PolygonAmoy,
    BitcoinTestnet,
    SolanaDevnet,
    NearTestnet,
    RippleTestnet,
}

/// Protocol family. Every chain in a family shares one adapter implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Bitcoin,
    Solana,
    Near,
    Ripple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    Secp256k1,
    Ed25519,
}

impl Chain {
    pub const ALL: [Chain; 17] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Optimism,
        Chain::Bsc,
        Chain::Avalanche,
        Chain::Bitcoin,
        Chain::Solana,
        Chain::Near,
        Chain::Ripple,
        Chain::Sepolia,
        Chain::PolygonAmoy,
        Chain::BitcoinTestnet,
        Chain::SolanaDevnet,
        Chain::NearTestnet,
        Chain::RippleTestnet,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Ethereum
            | Chain::Polygon
            | Chain::Arbitrum
            | Chain::Base
            | Chain::Optimism
            | Chain::Bsc
            | Chain::Avalanche
            | Chain::Sepolia
            | Chain::PolygonAmoy => ChainFamily::Evm,
            Chain::Bitcoin | Chain::BitcoinTestnet => ChainFamily::Bitcoin,
            Chain::Solana | Chain::SolanaDevnet => ChainFamily::Solana,
            Chain::Near | Chain::NearTestnet => ChainFamily::Near,
            Chain::Ripple | Chain::RippleTestnet => ChainFamily::Ripple,
        }
    }

    /// Stable kebab-case identifier used in configuration files.
    pub fn id(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Optimism => "optimism",
            Chain::Bsc => "bsc",
            Chain::Avalanche => "avalanche",
            Chain::Bitcoin => "bitcoin",
            Chain::Solana => "solana",
            Chain::Near => "near",
            Chain::Ripple => "ripple",
            Chain::Sepolia => "sepolia",
            Chain::PolygonAmoy => "polygon-amoy",
            Chain::BitcoinTestnet => "bitcoin-testnet",
            Chain::SolanaDevnet => "solana-devnet",
            Chain::NearTestnet => "near-testnet",
            Chain::RippleTestnet => "ripple-testnet",
        }
    }

    /// EIP-155 chain id. `None` outside the EVM family.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Polygon => Some(137),
            Chain::Arbitrum => Some(42161),
            Chain::Base => Some(8453),
            Chain::Optimism => Some(10),
            Chain::Bsc => Some(56),
            Chain::Avalanche => Some(43114),
            Chain::Sepolia => Some(11155111),
            Chain::PolygonAmoy => Some(80002),
            _ => None,
        }
    }

    /// BIP-44 / SLIP-44 coin type.
    pub fn coin_type(&self) -> u32 {
        match self.family() {
            ChainFamily::Bitcoin if self.is_testnet() => 1,
            ChainFamily::Bitcoin => 0,
            ChainFamily::Evm => 60,
            ChainFamily::Solana => 501,
            ChainFamily::Near => 397,
            ChainFamily::Ripple => 144,
        }
    }

    pub fn curve(&self) -> CurveType {
        match self.family() {
            ChainFamily::Solana | ChainFamily::Near => CurveType::Ed25519,
            _ => CurveType::Secp256k1,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Polygon => "Polygon",
            Chain::Arbitrum => "Arbitrum One",
            Chain::Base => "Base",
            Chain::Optimism => "Optimism",
            Chain::Bsc => "BNB Smart Chain",
            Chain::Avalanche => "Avalanche C-Chain",
            Chain::Bitcoin => "Bitcoin",
            Chain::Solana => "Solana",
            Chain::Near => "NEAR Protocol",
            Chain::Ripple => "XRP Ledger",
            Chain::Sepolia => "Sepolia Testnet",
            Chain::PolygonAmoy => "Polygon Amoy Testnet",
            Chain::BitcoinTestnet => "Bitcoin Testnet",
            Chain::SolanaDevnet => "Solana Devnet",
            Chain::NearTestnet => "NEAR Testnet",
            Chain::RippleTestnet => "XRP Ledger Testnet",
        }
    }

    /// Native token symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Sepolia | Chain::Arbitrum | Chain::Base | Chain::Optimism => {
                "ETH"
            }
            Chain::Polygon | Chain::PolygonAmoy => "POL",
            Chain::Bsc => "BNB",
            Chain::Avalanche => "AVAX",
            Chain::Bitcoin | Chain::BitcoinTestnet => "BTC",
            Chain::Solana | Chain::SolanaDevnet => "SOL",
            Chain::Near | Chain::NearTestnet => "NEAR",
            Chain::Ripple | Chain::RippleTestnet => "XRP",
        }
    }

    /// Decimal places of the native base unit (wei, satoshi, lamport, yocto, drop).
    pub fn decimals(&self) -> u8 {
        match self.family() {
            ChainFamily::Evm => 18,
            ChainFamily::Bitcoin => 8,
            ChainFamily::Solana => 9,
            ChainFamily::Near => 24,
            ChainFamily::Ripple => 6,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Chain::Sepolia
                | Chain::PolygonAmoy
                | Chain::BitcoinTestnet
                | Chain::SolanaDevnet
                | Chain::NearTestnet
                | Chain::RippleTestnet
        )
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Chain {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.id() == wanted)
            .ok_or_else(|| ChainError::UnsupportedChain(s.to_string()))
    }
}
