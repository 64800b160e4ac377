use std::collections::HashSet;

use crate::chains::Blockchain;

pub const STABLECOINS: &[&str] = &["USDC", "USDT", "DAI", "BUSD"];

/// Name fragments that show up in most freshly launched meme tokens.
pub const MEME_FRAGMENTS: &[&str] = &[
    "pepe", "doge", "shib", "inu", "elon", "moon", "cat", "frog", "wojak", "bonk", "wif",
    "floki", "pump", "meme", "ai", "baby", "trump", "chad",
];

/// Short probes that widen coverage beyond the curated fragments. Kept at two
/// characters: single-character terms are rejected by the relays.
pub const ALPHA_PROBES: &[&str] = &[
    "an", "ba", "bo", "ca", "co", "da", "do", "el", "go", "ka", "la", "ma", "mo", "pa", "po",
    "ra", "sa", "su", "ta", "to", "wo", "za",
];

/// Ordered search terms for a chain: display name, native symbol, quote
/// tokens, stablecoins, meme fragments, alphabetic probes. Duplicates are
/// dropped case-insensitively, keeping the first occurrence.
pub fn build_search_terms(chain: Blockchain) -> Vec<String> {
    let info = chain.info();
    let candidates = std::iter::once(info.display_name)
        .chain(std::iter::once(info.native_symbol))
        .chain(info.quote_tokens.iter().copied())
        .chain(STABLECOINS.iter().copied())
        .chain(MEME_FRAGMENTS.iter().copied())
        .chain(ALPHA_PROBES.iter().copied());

    let mut seen = HashSet::new();
    candidates
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// A lone alphabetic character is never sent upstream.
pub fn is_skipped_term(term: &str) -> bool {
    let mut chars = term.trim().chars();
    match (chars.next(), chars.next()) {
        (None, _) => true,
        (Some(c), None) => c.is_alphabetic(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_start_with_chain_identity() {
        let terms = build_search_terms(Blockchain::Solana);
        assert_eq!(&terms[..2], &["Solana".to_string(), "SOL".to_string()]);
        assert!(terms.contains(&"USDC".to_string()));
        assert!(terms.contains(&"pepe".to_string()));
        assert!(terms.len() > 40);
    }

    #[test]
    fn terms_are_unique_ignoring_case() {
        // Solana's quote tokens repeat SOL/USDC/USDT, which must appear once.
        let terms = build_search_terms(Blockchain::Solana);
        let lowered: HashSet<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        assert_eq!(lowered.len(), terms.len());
        assert_eq!(terms.iter().filter(|t| t.eq_ignore_ascii_case("usdc")).count(), 1);
    }

    #[test]
    fn built_terms_are_never_skipped() {
        for chain in Blockchain::ALL {
            assert!(build_search_terms(chain).iter().all(|t| !is_skipped_term(t)));
        }
    }

    #[test]
    fn single_letters_are_skipped() {
        assert!(is_skipped_term("a"));
        assert!(is_skipped_term(" Z "));
        assert!(is_skipped_term(""));
        assert!(!is_skipped_term("ab"));
        assert!(!is_skipped_term("7"));
    }
}
