use serde::{Deserialize, Serialize};

use crate::chains::Blockchain;

// ---------------------------------------------------------------------------
// TradingPair: one DexScreener pair, pass-through wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPair {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default)]
    pub base_token: TokenRef,
    #[serde(default)]
    pub quote_token: TokenRef,
    #[serde(default)]
    pub price_native: Option<String>,
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub price_change: Option<PriceChange>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Seconds or milliseconds depending on the indexer; see
    /// `filter::normalize_created_at_ms`.
    #[serde(default)]
    pub pair_created_at: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
    /// Opaque and case-sensitive.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

impl TradingPair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn volume_h24(&self) -> Option<f64> {
        self.volume.as_ref().and_then(|v| v.h24)
    }

    /// Deduplication key: (base token contract, chain id).
    pub fn dedup_key(&self) -> (&str, &str) {
        (
            self.base_token.address.as_str(),
            self.chain_id.as_deref().unwrap_or(""),
        )
    }
}

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Inclusive ranges. min <= max is the caller's responsibility; an inverted
/// range just matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub min_market_cap: u64,
    pub max_market_cap: u64,
    /// Days.
    pub min_age: u64,
    /// Days.
    pub max_age: u64,
    pub min_liquidity: u64,
    pub max_liquidity: u64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_market_cap: 1_000,
            max_market_cap: 10_000_000,
            min_age: 0,
            max_age: 30,
            min_liquidity: 1_000,
            max_liquidity: 5_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline output
// ---------------------------------------------------------------------------

/// Per-reason rejection counters from Filter & Rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub candidates: usize,
    pub rejected_no_market_cap: usize,
    pub rejected_bad_age: usize,
    pub rejected_no_liquidity: usize,
    pub rejected_market_cap_range: usize,
    pub rejected_age_range: usize,
    pub rejected_liquidity_range: usize,
    pub matched: usize,
    pub truncated: usize,
}

/// Counters from the fan-out stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanOutStats {
    pub terms: usize,
    pub skipped: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub failed: usize,
    pub raw_pairs: usize,
}

/// Result of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub chain: Blockchain,
    pub generation: u64,
    pub criteria: FilterCriteria,
    pub limit: usize,
    pub pairs: Vec<TradingPair>,
    pub fan_out: FanOutStats,
    pub merged: usize,
    pub filter: FilterStats,
    pub elapsed_ms: u64,
    /// Unix milliseconds at completion.
    pub completed_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dexscreener_pair() {
        let raw = r#"{
            "chainId": "solana",
            "dexId": "raydium",
            "url": "https://dexscreener.com/solana/abc",
            "pairAddress": "abc",
            "baseToken": {"address": "Mint111", "name": "Frog", "symbol": "FROG"},
            "quoteToken": {"address": "So111", "name": "Wrapped SOL", "symbol": "SOL"},
            "priceNative": "0.0000012",
            "priceUsd": "0.00021",
            "volume": {"h24": 12000.5, "h6": 100},
            "priceChange": {"h24": -12.4},
            "liquidity": {"usd": 20000, "base": 1, "quote": 2},
            "fdv": 51000,
            "marketCap": 50000,
            "pairCreatedAt": 1760000000000,
            "info": {"imageUrl": "x"}
        }"#;
        let pair: TradingPair = serde_json::from_str(raw).unwrap();
        assert_eq!(pair.dedup_key(), ("Mint111", "solana"));
        assert_eq!(pair.liquidity_usd(), Some(20000.0));
        assert_eq!(pair.volume_h24(), Some(12000.5));
        assert_eq!(pair.price_usd.as_deref(), Some("0.00021"));
        assert_eq!(pair.market_cap, Some(50000.0));
    }

    #[test]
    fn tolerates_sparse_pair() {
        let pair: TradingPair = serde_json::from_str(r#"{"pairAddress":"p1"}"#).unwrap();
        assert_eq!(pair.dedup_key(), ("", ""));
        assert!(pair.liquidity_usd().is_none());
        assert!(pair.price_usd.is_none());
    }
}
