use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::health::HealthState;
use crate::chains::Blockchain;
use crate::error::{AppError, Result};
use crate::fetcher::queries::build_search_terms;
use crate::fetcher::PairFetcher;
use crate::filter::{filter_and_rank, now_ms};
use crate::merge::dedup_pairs;
use crate::state::ResultStore;
use crate::types::{FilterCriteria, SearchOutcome};

/// Fan-out → merge → filter & rank, with stale-run cancellation.
///
/// Each run takes a fresh generation number for its chain. Starting a newer
/// run for the same chain drops the older run's in-flight requests, and an
/// outcome is only published while its generation is still current.
pub struct SearchPipeline {
    fetcher: Arc<PairFetcher>,
    store: Arc<ResultStore>,
    health: Arc<HealthState>,
    /// Monotonic across all chains.
    next_generation: AtomicU64,
    /// chain → current generation.
    generations: DashMap<Blockchain, watch::Sender<u64>>,
    /// chain → runs currently executing.
    in_flight: DashMap<Blockchain, usize>,
}

/// Counts a run as in flight until dropped, including when the run's
/// future is dropped mid-fan-out.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Blockchain, usize>,
    chain: Blockchain,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a DashMap<Blockchain, usize>, chain: Blockchain) -> Self {
        *in_flight.entry(chain).or_insert(0) += 1;
        Self { in_flight, chain }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut n) = self.in_flight.get_mut(&self.chain) {
            *n = n.saturating_sub(1);
        }
    }
}

impl SearchPipeline {
    pub fn new(fetcher: Arc<PairFetcher>, store: Arc<ResultStore>, health: Arc<HealthState>) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            store,
            health,
            next_generation: AtomicU64::new(0),
            generations: DashMap::new(),
            in_flight: DashMap::new(),
        })
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Claim a new generation for `chain`, superseding any run in progress.
    fn begin(&self, chain: Blockchain) -> (u64, watch::Receiver<u64>) {
        let sender = self
            .generations
            .entry(chain)
            .or_insert_with(|| watch::channel(0).0);
        // Allocated under the entry lock so per-chain generations are published in order.
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        sender.send_replace(generation);
        (generation, sender.subscribe())
    }

    pub fn current_generation(&self, chain: Blockchain) -> Option<u64> {
        self.generations.get(&chain).map(|s| *s.borrow())
    }

    /// True while any run for `chain` is between `execute` start and finish.
    pub fn is_searching(&self, chain: Blockchain) -> bool {
        self.in_flight.get(&chain).is_some_and(|n| *n > 0)
    }

    fn is_current(&self, chain: Blockchain, generation: u64) -> bool {
        self.current_generation(chain) == Some(generation)
    }

    /// Run the pipeline without publishing. Fails only with `Superseded`;
    /// per-term failures have already degraded to empty lists.
    pub async fn execute(&self, chain: Blockchain, criteria: FilterCriteria, limit: usize) -> Result<SearchOutcome> {
        let started = Instant::now();
        let _in_flight = InFlightGuard::enter(&self.in_flight, chain);
        let (generation, mut watcher) = self.begin(chain);
        let terms = build_search_terms(chain);
        debug!(chain = %chain, generation, terms = terms.len(), "search started");

        let (lists, fan_out) = tokio::select! {
            res = self.fetcher.fan_out(chain, &terms) => res,
            _ = superseded(&mut watcher, generation) => {
                self.health.inc_superseded();
                info!(chain = %chain, generation, "search superseded, in-flight requests dropped");
                return Err(AppError::Superseded);
            }
        };

        let candidates = dedup_pairs(lists);
        let merged = candidates.len();
        let (pairs, filter) = filter_and_rank(candidates, &criteria, limit, now_ms());

        Ok(SearchOutcome {
            chain,
            generation,
            criteria,
            limit,
            pairs,
            fan_out,
            merged,
            filter,
            elapsed_ms: started.elapsed().as_millis() as u64,
            completed_at_ms: now_ms() as u64,
        })
    }

    /// Publish an outcome if its generation is still current for its chain.
    pub fn publish(&self, outcome: &SearchOutcome) -> Result<()> {
        if !self.is_current(outcome.chain, outcome.generation) || !self.store.publish(outcome.clone()) {
            self.health.inc_superseded();
            debug!(chain = %outcome.chain, generation = outcome.generation, "stale outcome discarded");
            return Err(AppError::Superseded);
        }
        self.health.record_search(outcome.completed_at_ms);
        info!(
            chain = %outcome.chain,
            generation = outcome.generation,
            merged = outcome.merged,
            matched = outcome.filter.matched,
            returned = outcome.pairs.len(),
            elapsed_ms = outcome.elapsed_ms,
            "search published: {} of {} candidates",
            outcome.pairs.len(),
            outcome.merged,
        );
        Ok(())
    }

    /// Execute and publish.
    pub async fn run(&self, chain: Blockchain, criteria: FilterCriteria, limit: usize) -> Result<SearchOutcome> {
        let outcome = self.execute(chain, criteria, limit).await?;
        self.publish(&outcome)?;
        Ok(outcome)
    }
}

/// Resolves once the chain's generation moves past `generation`.
async fn superseded(watcher: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *watcher.borrow_and_update() != generation {
            return;
        }
        if watcher.changed().await.is_err() {
            // Sender lives as long as the pipeline; nothing can supersede us.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::api::latency::LatencyStats;
    use crate::config::Config;
    use crate::fetcher::testing::{pairs_body, FakeTransport};
    use crate::fetcher::transport::HttpTransport;
    use crate::filter::MS_PER_DAY;
    use crate::state::MemoryPairCache;

    pub(crate) fn test_config() -> Config {
        Config {
            api_url: "https://api.test".to_string(),
            proxies: vec!["{url}".to_string()],
            retry_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            fetch_concurrency: 4,
            ..Config::default()
        }
    }

    pub(crate) fn build_pipeline(transport: Arc<dyn HttpTransport>) -> (Arc<SearchPipeline>, Arc<HealthState>) {
        let cfg = test_config();
        let health = Arc::new(HealthState::new());
        let fetcher = Arc::new(PairFetcher::new(
            &cfg,
            transport,
            Arc::new(MemoryPairCache::new(256)),
            Arc::new(LatencyStats::new()),
            health.clone(),
        ));
        (SearchPipeline::new(fetcher, ResultStore::new(), health.clone()), health)
    }

    pub(crate) fn json_pair(addr: &str, chain: &str, market_cap: f64, liquidity: Option<f64>, age_days: f64) -> serde_json::Value {
        let mut v = serde_json::json!({
            "chainId": chain,
            "pairAddress": format!("pair-{addr}"),
            "baseToken": {"address": addr, "name": addr, "symbol": addr},
            "marketCap": market_cap,
            "priceUsd": "0.001",
            "volume": {"h24": 1000.0},
            "pairCreatedAt": (now_ms() - age_days * MS_PER_DAY) as u64,
        });
        if let Some(usd) = liquidity {
            v["liquidity"] = serde_json::json!({ "usd": usd });
        }
        v
    }

    #[tokio::test]
    async fn end_to_end_merges_filters_and_publishes() {
        let transport = Arc::new(FakeTransport::new());
        transport.route(
            "q=pepe",
            Ok(pairs_body(&[
                json_pair("PEPE", "solana", 50_000.0, Some(20_000.0), 5.0),
                json_pair("NOLIQ", "solana", 50_000.0, None, 5.0),
                json_pair("BSCPEPE", "bsc", 80_000.0, Some(20_000.0), 5.0),
            ])),
        );
        transport.route(
            "q=doge",
            Ok(pairs_body(&[
                json_pair("PEPE", "solana", 50_000.0, Some(20_000.0), 5.0),
                json_pair("BIG", "solana", 20_000_000.0, Some(20_000.0), 5.0),
                json_pair("DOGE", "solana", 900_000.0, Some(90_000.0), 2.0),
            ])),
        );
        // Every other term fails and degrades to an empty list.
        let (pipeline, health) = build_pipeline(transport.clone());

        let outcome = pipeline
            .run(Blockchain::Solana, FilterCriteria::default(), 10)
            .await
            .unwrap();

        let addrs: Vec<&str> = outcome.pairs.iter().map(|p| p.base_token.address.as_str()).collect();
        assert_eq!(addrs, vec!["DOGE", "PEPE"]);
        assert_eq!(outcome.merged, 4, "PEPE deduplicated, BSC pair filtered by chain");
        assert_eq!(outcome.filter.rejected_no_liquidity, 1);
        assert_eq!(outcome.filter.rejected_market_cap_range, 1);
        assert!(outcome.fan_out.failed > 0);
        assert_eq!(pipeline.store().latest(Blockchain::Solana).unwrap().generation, outcome.generation);
        assert_eq!(health.snapshot().searches_completed, 1);

        // Second run is served entirely from cache.
        let requests_before = transport.requests().len();
        let again = pipeline.run(Blockchain::Solana, FilterCriteria::default(), 10).await.unwrap();
        assert_eq!(transport.requests().len(), requests_before);
        assert_eq!(again.fan_out.cache_hits, again.fan_out.terms - again.fan_out.skipped);
        assert!(again.generation > outcome.generation);
    }

    pub(crate) struct SlowTransport;

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn get_text(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(pairs_body(&[]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn newer_search_supersedes_in_flight_one() {
        let (pipeline, health) = build_pipeline(Arc::new(SlowTransport));

        let first = {
            let p = pipeline.clone();
            tokio::spawn(async move { p.run(Blockchain::Solana, FilterCriteria::default(), 10).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = pipeline.run(Blockchain::Solana, FilterCriteria::default(), 10).await.unwrap();
        let first = first.await.unwrap();

        assert!(matches!(first, Err(AppError::Superseded)));
        assert_eq!(pipeline.store().latest(Blockchain::Solana).unwrap().generation, second.generation);
        assert_eq!(health.snapshot().searches_superseded, 1);
        assert!(!pipeline.is_searching(Blockchain::Solana), "dropped run no longer counted");
    }

    #[tokio::test(start_paused = true)]
    async fn other_chains_are_not_superseded() {
        let (pipeline, _) = build_pipeline(Arc::new(SlowTransport));

        let sol = {
            let p = pipeline.clone();
            tokio::spawn(async move { p.run(Blockchain::Solana, FilterCriteria::default(), 10).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let base = pipeline.run(Blockchain::Base, FilterCriteria::default(), 10).await;

        assert!(base.is_ok());
        assert!(sol.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stale_outcome_is_not_published() {
        let (pipeline, _) = build_pipeline(Arc::new(FakeTransport::new()));

        let old = pipeline.execute(Blockchain::Base, FilterCriteria::default(), 10).await.unwrap();
        let new = pipeline.run(Blockchain::Base, FilterCriteria::default(), 10).await.unwrap();

        assert!(matches!(pipeline.publish(&old), Err(AppError::Superseded)));
        assert_eq!(pipeline.store().latest(Blockchain::Base).unwrap().generation, new.generation);
    }
}
