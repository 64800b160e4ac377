//! Static registry of supported blockchains: DexScreener chain id, native and
//! quote token symbols, display name.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blockchain {
    Solana,
    Ethereum,
    Bsc,
    Base,
    Polygon,
    Arbitrum,
}

/// Registry row for one chain.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChainInfo {
    pub chain: Blockchain,
    /// Identifier DexScreener uses in `chainId`.
    pub chain_id: &'static str,
    pub native_symbol: &'static str,
    /// Tokens new pairs are commonly quoted against.
    pub quote_tokens: &'static [&'static str],
    pub display_name: &'static str,
}

const REGISTRY: &[ChainInfo] = &[
    ChainInfo {
        chain: Blockchain::Solana,
        chain_id: "solana",
        native_symbol: "SOL",
        quote_tokens: &["SOL", "USDC", "USDT"],
        display_name: "Solana",
    },
    ChainInfo {
        chain: Blockchain::Ethereum,
        chain_id: "ethereum",
        native_symbol: "ETH",
        quote_tokens: &["WETH", "USDC", "USDT"],
        display_name: "Ethereum",
    },
    ChainInfo {
        chain: Blockchain::Bsc,
        chain_id: "bsc",
        native_symbol: "BNB",
        quote_tokens: &["WBNB", "BUSD", "USDT"],
        display_name: "BNB Chain",
    },
    ChainInfo {
        chain: Blockchain::Base,
        chain_id: "base",
        native_symbol: "ETH",
        quote_tokens: &["WETH", "USDC"],
        display_name: "Base",
    },
    ChainInfo {
        chain: Blockchain::Polygon,
        chain_id: "polygon",
        native_symbol: "POL",
        quote_tokens: &["WMATIC", "WPOL", "USDC"],
        display_name: "Polygon",
    },
    ChainInfo {
        chain: Blockchain::Arbitrum,
        chain_id: "arbitrum",
        native_symbol: "ETH",
        quote_tokens: &["WETH", "USDC", "ARB"],
        display_name: "Arbitrum",
    },
];

impl Blockchain {
    #[cfg(test)]
    pub const ALL: [Blockchain; 6] = [
        Blockchain::Solana,
        Blockchain::Ethereum,
        Blockchain::Bsc,
        Blockchain::Base,
        Blockchain::Polygon,
        Blockchain::Arbitrum,
    ];

    pub fn info(self) -> &'static ChainInfo {
        // REGISTRY is declared in enum order.
        &REGISTRY[self as usize]
    }

    pub fn chain_id(self) -> &'static str {
        self.info().chain_id
    }
}

pub fn registry() -> &'static [ChainInfo] {
    REGISTRY
}

impl std::fmt::Display for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.chain_id())
    }
}

impl std::str::FromStr for Blockchain {
    type Err = AppError;

    /// Accepts a chain id or display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        REGISTRY
            .iter()
            .find(|info| {
                info.chain_id.eq_ignore_ascii_case(s) || info.display_name.eq_ignore_ascii_case(s)
            })
            .map(|info| info.chain)
            .ok_or_else(|| AppError::UnknownChain(s.to_string()))
    }
}
