use crate::chains::Blockchain;
use crate::error::AppError;
use crate::types::TradingPair;

/// How search results are narrowed to the requested chain.
///
/// DexScreener tags are not always consistent across venues, so `Loose`
/// also accepts a match on the chain display name, a dex id mentioning the
/// chain, or a pair URL under the chain's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMatch {
    #[default]
    Loose,
    Strict,
}

impl ChainMatch {
    pub fn matches(self, pair: &TradingPair, chain: Blockchain) -> bool {
        let info = chain.info();
        let chain_id = pair.chain_id.as_deref().unwrap_or("");
        if chain_id.eq_ignore_ascii_case(info.chain_id) {
            return true;
        }
        if self == ChainMatch::Strict {
            return false;
        }

        if chain_id.eq_ignore_ascii_case(info.display_name) {
            return true;
        }
        let dex_hit = pair
            .dex_id
            .as_deref()
            .is_some_and(|d| d.to_ascii_lowercase().contains(info.chain_id));
        let url_hit = pair.url.as_deref().is_some_and(|u| {
            u.to_ascii_lowercase()
                .contains(&format!("/{}/", info.chain_id))
        });
        dex_hit || url_hit
    }
}

impl std::str::FromStr for ChainMatch {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(ChainMatch::Loose),
            "strict" => Ok(ChainMatch::Strict),
            other => Err(AppError::Config(format!(
                "CHAIN_MATCH must be loose or strict, got {other}"
            ))),
        }
    }
}
