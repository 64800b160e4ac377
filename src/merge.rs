use std::collections::HashSet;

use crate::types::TradingPair;

/// Flatten per-term result lists into one candidate list keyed by
/// (base token address, chain id). First occurrence in term order wins.
pub fn dedup_pairs<I>(lists: I) -> Vec<TradingPair>
where
    I: IntoIterator<Item = Vec<TradingPair>>,
{
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut merged = Vec::new();

    for pair in lists.into_iter().flatten() {
        let (address, chain_id) = pair.dedup_key();
        if seen.insert((address.to_string(), chain_id.to_string())) {
            merged.push(pair);
        }
    }
    merged
}
