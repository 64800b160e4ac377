use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::chains::Blockchain;
use crate::error::AppError;
use crate::pipeline::SearchPipeline;
use crate::types::{FilterCriteria, TradingPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Published,
    /// Same pairs with the same figures as the published set; not re-published.
    Unchanged,
    /// A newer search for the chain took over.
    Superseded,
    /// Another search for the chain was running; the tick was left out.
    Skipped,
    Failed,
}

/// Re-runs the displayed search for one chain on a fixed interval, with the
/// criteria and limit of the published outcome. The configured defaults are
/// used only until something is published. Each run is awaited inside the
/// loop and missed ticks are skipped, so runs never overlap.
pub struct AutoRefresher {
    pipeline: Arc<SearchPipeline>,
    chain: Blockchain,
    default_criteria: FilterCriteria,
    default_limit: usize,
    period: Duration,
}

impl AutoRefresher {
    pub fn new(
        pipeline: Arc<SearchPipeline>,
        chain: Blockchain,
        default_criteria: FilterCriteria,
        default_limit: usize,
        period: Duration,
    ) -> Self {
        Self { pipeline, chain, default_criteria, default_limit, period }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.refresh_once().await;
        }
    }

    pub async fn refresh_once(&self) -> RefreshStatus {
        // A running search would be superseded by this one; let it finish.
        if self.pipeline.is_searching(self.chain) {
            debug!(chain = %self.chain, "search in flight, refresh tick skipped");
            return RefreshStatus::Skipped;
        }

        let (criteria, limit) = match self.pipeline.store().latest(self.chain) {
            Some(shown) => (shown.criteria, shown.limit),
            None => (self.default_criteria, self.default_limit),
        };

        let outcome = match self.pipeline.execute(self.chain, criteria, limit).await {
            Ok(o) => o,
            Err(AppError::Superseded) => {
                debug!(chain = %self.chain, "refresh superseded by a newer search");
                return RefreshStatus::Superseded;
            }
            Err(e) => {
                error!(chain = %self.chain, "refresh failed: {e}");
                return RefreshStatus::Failed;
            }
        };

        if let Some(current) = self.pipeline.store().latest(self.chain) {
            if current.criteria == outcome.criteria
                && current.limit == outcome.limit
                && results_equivalent(&current.pairs, &outcome.pairs)
            {
                info!(
                    chain = %self.chain,
                    pairs = outcome.pairs.len(),
                    "refresh complete: results unchanged"
                );
                return RefreshStatus::Unchanged;
            }
        }

        match self.pipeline.publish(&outcome) {
            Ok(()) => RefreshStatus::Published,
            Err(AppError::Superseded) => RefreshStatus::Superseded,
            Err(e) => {
                error!(chain = %self.chain, "refresh publish failed: {e}");
                RefreshStatus::Failed
            }
        }
    }
}

/// Element-wise comparison: same length, and at each position the same pair
/// address with equal market cap, liquidity, creation time, price and 24h
/// volume.
pub fn results_equivalent(current: &[TradingPair], fresh: &[TradingPair]) -> bool {
    current.len() == fresh.len()
        && current.iter().zip(fresh).all(|(a, b)| {
            a.pair_address == b.pair_address
                && a.market_cap == b.market_cap
                && a.liquidity_usd() == b.liquidity_usd()
                && a.pair_created_at == b.pair_created_at
                && a.price_usd == b.price_usd
                && a.volume_h24() == b.volume_h24()
        })
}
