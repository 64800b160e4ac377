pub mod matcher;
pub mod proxy;
pub mod queries;
pub mod response;
pub mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::chains::Blockchain;
use crate::config::{Config, SEARCH_CACHE_NAMESPACE};
use crate::error::{AppError, Result};
use crate::state::pair_cache::{cache_key, PairCache};
use crate::types::{FanOutStats, TradingPair};

use self::matcher::ChainMatch;
use self::proxy::{encode_component, ProxyRotation};
use self::queries::is_skipped_term;
use self::response::decode_pairs_body;
use self::transport::HttpTransport;

/// How a single search term was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TermResolution {
    /// Single-character term, no request made.
    Skipped,
    CacheHit(Vec<TradingPair>),
    Fetched(Vec<TradingPair>),
    /// Every proxy failed; resolves to an empty list.
    Failed,
}

impl TermResolution {
    pub fn into_pairs(self) -> Vec<TradingPair> {
        match self {
            TermResolution::CacheHit(p) | TermResolution::Fetched(p) => p,
            TermResolution::Skipped | TermResolution::Failed => Vec::new(),
        }
    }
}

/// Resolves search terms against DexScreener through the cache and the
/// rotating relays.
pub struct PairFetcher {
    api_url: String,
    proxies: ProxyRotation,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn PairCache>,
    chain_match: ChainMatch,
    concurrency: usize,
    request_timeout: Duration,
    retry_delay: Duration,
    cache_ttl: Duration,
    cache_failure_ttl: Duration,
    latency: Arc<LatencyStats>,
    health: Arc<HealthState>,
}

impl PairFetcher {
    pub fn new(
        cfg: &Config,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn PairCache>,
        latency: Arc<LatencyStats>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            proxies: ProxyRotation::new(cfg.proxies.clone()),
            transport,
            cache,
            chain_match: cfg.chain_match,
            concurrency: cfg.fetch_concurrency.max(1),
            request_timeout: cfg.request_timeout,
            retry_delay: cfg.retry_delay,
            cache_ttl: cfg.cache_ttl,
            cache_failure_ttl: cfg.cache_failure_ttl,
            latency,
            health,
        }
    }

    pub fn search_url(&self, term: &str) -> String {
        format!("{}/latest/dex/search?q={}", self.api_url, encode_component(term.trim()))
    }

    pub fn token_url(&self, address: &str) -> String {
        format!("{}/latest/dex/tokens/{}", self.api_url, encode_component(address.trim()))
    }

    /// GET `target` through the relays: attempt N uses relay N mod len, one
    /// attempt per relay, fixed delay between attempts.
    async fn fetch_with_rotation(&self, target: &str) -> Result<Vec<TradingPair>> {
        let attempts = self.proxies.len();
        if attempts == 0 {
            return Err(AppError::ProxiesExhausted { attempts: 0 });
        }

        for attempt in 0..attempts {
            if attempt > 0 && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
            let url = self.proxies.url_for_attempt(attempt, target);
            let started = Instant::now();

            let result = match tokio::time::timeout(self.request_timeout, self.transport.get_text(&url)).await {
                Ok(Ok(body)) => decode_pairs_body(&body),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(AppError::Transport(format!(
                    "timed out after {}ms",
                    self.request_timeout.as_millis()
                ))),
            };
            self.latency.record(started.elapsed());

            match result {
                Ok(pairs) => return Ok(pairs),
                Err(e) if e.is_transport() => {
                    warn!(
                        attempt = attempt + 1,
                        of = attempts,
                        proxy = %self.proxies.template_for_attempt(attempt),
                        "fetch attempt failed: {e}"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::ProxiesExhausted { attempts })
    }

    /// Resolve one term to the pairs on `chain`. Never fails: exhaustion
    /// degrades to an empty (and briefly cached) list.
    pub async fn resolve_term(&self, chain: Blockchain, term: &str) -> TermResolution {
        if is_skipped_term(term) {
            debug!(term = %term, "skipping single-character term");
            return TermResolution::Skipped;
        }

        let key = cache_key(SEARCH_CACHE_NAMESPACE, chain, term);
        if let Some(cached) = self.cache.get(&key) {
            return TermResolution::CacheHit(cached);
        }

        match self.fetch_with_rotation(&self.search_url(term)).await {
            Ok(raw) => {
                let raw_len = raw.len();
                let pairs: Vec<TradingPair> = raw
                    .into_iter()
                    .filter(|p| self.chain_match.matches(p, chain))
                    .collect();
                debug!(term = %term, chain = %chain, raw = raw_len, kept = pairs.len(), "term resolved");
                self.cache.set(&key, pairs.clone(), self.cache_ttl);
                TermResolution::Fetched(pairs)
            }
            Err(e) => {
                warn!(term = %term, chain = %chain, "term failed, using empty result: {e}");
                self.health.inc_terms_failed();
                self.cache.set(&key, Vec::new(), self.cache_failure_ttl);
                TermResolution::Failed
            }
        }
    }

    /// Resolve every term with at most `concurrency` in flight. Waits for all
    /// of them; output lists are in term order whatever the completion order.
    pub async fn fan_out(&self, chain: Blockchain, terms: &[String]) -> (Vec<Vec<TradingPair>>, FanOutStats) {
        // Owned terms keep the futures Send for spawned callers.
        let pending: Vec<_> = terms
            .iter()
            .cloned()
            .enumerate()
            .map(move |(index, term)| async move { (index, self.resolve_term(chain, &term).await) })
            .collect();
        let mut resolved: Vec<(usize, TermResolution)> = stream::iter(pending)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        resolved.sort_by_key(|(index, _)| *index);

        let mut stats = FanOutStats {
            terms: terms.len(),
            ..FanOutStats::default()
        };
        let lists: Vec<Vec<TradingPair>> = resolved
            .into_iter()
            .map(|(_, resolution)| {
                match &resolution {
                    TermResolution::Skipped => stats.skipped += 1,
                    TermResolution::CacheHit(_) => stats.cache_hits += 1,
                    TermResolution::Fetched(_) => stats.fetched += 1,
                    TermResolution::Failed => stats.failed += 1,
                }
                let pairs = resolution.into_pairs();
                stats.raw_pairs += pairs.len();
                pairs
            })
            .collect();

        info!(
            chain = %chain,
            terms = stats.terms,
            fetched = stats.fetched,
            cache_hits = stats.cache_hits,
            failed = stats.failed,
            skipped = stats.skipped,
            pairs = stats.raw_pairs,
            "fan-out complete"
        );
        (lists, stats)
    }

    /// All pairs for one token contract, any chain. Not cached; exhausting
    /// the relays is reported to the caller.
    pub async fn lookup_token(&self, address: &str) -> Result<Vec<TradingPair>> {
        if address.trim().is_empty() {
            return Err(AppError::NotFound("empty token address".to_string()));
        }
        self.fetch_with_rotation(&self.token_url(address)).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{pairs_body, FakeTransport};
    use super::*;
    use crate::state::MemoryPairCache;

    fn test_config(proxies: &[&str]) -> Config {
        Config {
            api_url: "https://api.test".to_string(),
            proxies: proxies.iter().map(|p| p.to_string()).collect(),
            retry_delay: Duration::ZERO,
            request_timeout: Duration::from_millis(200),
            fetch_concurrency: 4,
            ..Config::default()
        }
    }

    fn fetcher(cfg: &Config, transport: Arc<FakeTransport>, cache: Arc<MemoryPairCache>) -> PairFetcher {
        PairFetcher::new(
            cfg,
            transport,
            cache,
            Arc::new(LatencyStats::new()),
            Arc::new(HealthState::new()),
        )
    }

    fn sol_pair(addr: &str) -> serde_json::Value {
        serde_json::json!({"chainId": "solana", "pairAddress": format!("p-{addr}"), "baseToken": {"address": addr}})
    }

    fn bsc_pair(addr: &str) -> serde_json::Value {
        serde_json::json!({"chainId": "bsc", "pairAddress": format!("p-{addr}"), "baseToken": {"address": addr}})
    }

    #[tokio::test]
    async fn fetched_term_is_chain_filtered_and_cached() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        transport.route("q=pepe", Ok(pairs_body(&[sol_pair("A"), bsc_pair("B")])));
        let cache = Arc::new(MemoryPairCache::new(16));
        let f = fetcher(&cfg, transport.clone(), cache.clone());

        let res = f.resolve_term(Blockchain::Solana, "pepe").await;
        let pairs = match res {
            TermResolution::Fetched(pairs) => pairs,
            other => panic!("expected Fetched, got {other:?}"),
        };
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].base_token.address, "A");

        let cached = cache.get(&cache_key(SEARCH_CACHE_NAMESPACE, Blockchain::Solana, "pepe"));
        assert_eq!(cached.map(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn warm_cache_short_circuits_network() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        let cache = Arc::new(MemoryPairCache::new(16));
        let key = cache_key(SEARCH_CACHE_NAMESPACE, Blockchain::Solana, "doge");
        cache.set(&key, Vec::new(), Duration::from_secs(60));
        let f = fetcher(&cfg, transport.clone(), cache);

        let res = f.resolve_term(Blockchain::Solana, "doge").await;
        assert_eq!(res, TermResolution::CacheHit(Vec::new()));
        assert!(transport.requests().is_empty(), "cache hit must not touch the network");
    }

    #[tokio::test]
    async fn single_character_term_makes_no_request() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        let f = fetcher(&cfg, transport.clone(), Arc::new(MemoryPairCache::new(16)));

        assert_eq!(f.resolve_term(Blockchain::Solana, "x").await, TermResolution::Skipped);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn rotates_to_untried_proxy_on_last_attempt() {
        let cfg = test_config(&["https://r1.test/?u={url}", "https://r2.test/?u={url}", "https://r3.test/?u={url}"]);
        let transport = Arc::new(FakeTransport::new());
        transport.route("r1.test", Err(AppError::Transport("connection reset".into())));
        transport.route("r2.test", Ok("<html>bad gateway</html>".into()));
        transport.route("r3.test", Ok(pairs_body(&[sol_pair("A")])));
        let f = fetcher(&cfg, transport.clone(), Arc::new(MemoryPairCache::new(16)));

        let res = f.resolve_term(Blockchain::Solana, "frog").await;
        assert!(matches!(res, TermResolution::Fetched(ref p) if p.len() == 1));

        let hosts: Vec<String> = transport
            .requests()
            .iter()
            .map(|u| u.split('/').nth(2).unwrap_or_default().to_string())
            .collect();
        assert_eq!(hosts, vec!["r1.test", "r2.test", "r3.test"]);
    }

    #[tokio::test]
    async fn exhausted_proxies_resolve_to_empty() {
        let cfg = test_config(&["https://r1.test/?u={url}", "https://r2.test/?u={url}"]);
        let transport = Arc::new(FakeTransport::new());
        let cache = Arc::new(MemoryPairCache::new(16));
        let health = Arc::new(HealthState::new());
        let f = PairFetcher::new(&cfg, transport.clone(), cache.clone(), Arc::new(LatencyStats::new()), health.clone());

        let res = f.resolve_term(Blockchain::Solana, "moon").await;
        assert_eq!(res, TermResolution::Failed);
        assert_eq!(transport.requests().len(), 2, "one attempt per proxy");
        assert_eq!(health.snapshot().terms_failed, 1);

        // Failure is cached so the next run does not hammer the relays.
        let again = f.resolve_term(Blockchain::Solana, "moon").await;
        assert_eq!(again, TermResolution::CacheHit(Vec::new()));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn fan_out_keeps_term_order_and_survives_failures() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        transport.route("q=alpha", Ok(pairs_body(&[sol_pair("A1"), sol_pair("A2")])));
        transport.route("q=gamma", Ok(pairs_body(&[sol_pair("G1")])));
        // "beta" has no route and fails.
        let f = fetcher(&cfg, transport, Arc::new(MemoryPairCache::new(16)));

        let terms: Vec<String> = ["alpha", "beta", "q", "gamma"].iter().map(|s| s.to_string()).collect();
        let (lists, stats) = f.fan_out(Blockchain::Solana, &terms).await;

        assert_eq!(lists.len(), 4);
        assert_eq!(lists[0].len(), 2);
        assert!(lists[1].is_empty());
        assert!(lists[2].is_empty());
        assert_eq!(lists[3][0].base_token.address, "G1");
        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.raw_pairs, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fan_out_runs_on_a_spawned_task() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        transport.route("q=pepe", Ok(pairs_body(&[sol_pair("P1")])));
        let f = Arc::new(fetcher(&cfg, transport, Arc::new(MemoryPairCache::new(16))));

        let terms = vec!["pepe".to_string(), "wif".to_string()];
        let handle = tokio::spawn(async move { f.fan_out(Blockchain::Solana, &terms).await });
        let (lists, stats) = handle.await.unwrap();

        assert_eq!(lists[0][0].base_token.address, "P1");
        assert!(lists[1].is_empty());
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn token_lookup_reports_exhaustion() {
        let cfg = test_config(&["{url}"]);
        let transport = Arc::new(FakeTransport::new());
        transport.route("/tokens/Mint1", Ok(pairs_body(&[sol_pair("Mint1"), bsc_pair("Mint1")])));
        let f = fetcher(&cfg, transport, Arc::new(MemoryPairCache::new(16)));

        assert_eq!(f.lookup_token("Mint1").await.unwrap().len(), 2);
        assert!(matches!(
            f.lookup_token("Unknown").await,
            Err(AppError::ProxiesExhausted { attempts: 1 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_rotates() {
        use async_trait::async_trait;

        struct SlowFirst {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl HttpTransport for SlowFirst {
            async fn get_text(&self, _url: &str) -> Result<String> {
                let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(pairs_body(&[sol_pair("A")]))
            }
        }

        let cfg = test_config(&["{url}", "https://r2.test/?u={url}"]);
        let transport = Arc::new(SlowFirst { calls: Default::default() });
        let f = PairFetcher::new(
            &cfg,
            transport.clone(),
            Arc::new(MemoryPairCache::new(16)),
            Arc::new(LatencyStats::new()),
            Arc::new(HealthState::new()),
        );

        let res = f.resolve_term(Blockchain::Solana, "wif").await;
        assert!(matches!(res, TermResolution::Fetched(ref p) if p.len() == 1));
        assert_eq!(transport.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
