mod api;
mod chains;
mod config;
mod error;
mod fetcher;
mod filter;
mod merge;
mod pipeline;
mod refresh;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::transport::ReqwestTransport;
use crate::fetcher::PairFetcher;
use crate::pipeline::SearchPipeline;
use crate::refresh::AutoRefresher;
use crate::state::{MemoryPairCache, ResultStore};

/// Cache metrics log interval (seconds).
const CACHE_REPORT_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        api = %cfg.api_url,
        proxies = cfg.proxies.len(),
        concurrency = cfg.fetch_concurrency,
        cache_capacity = cfg.cache_capacity,
        chain_match = ?cfg.chain_match,
        "Scanner starting: timeout={}s retry_delay={}ms cache_ttl={}s",
        cfg.request_timeout.as_secs(),
        cfg.retry_delay.as_millis(),
        cfg.cache_ttl.as_secs(),
    );

    // --- Shared state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let cache = Arc::new(MemoryPairCache::new(cfg.cache_capacity));
    let store = ResultStore::new();

    // --- Pipeline ---
    let transport = Arc::new(ReqwestTransport::new()?);
    let fetcher = Arc::new(PairFetcher::new(
        &cfg,
        transport,
        cache.clone(),
        Arc::clone(&latency),
        Arc::clone(&health),
    ));
    let pipeline = SearchPipeline::new(Arc::clone(&fetcher), store, Arc::clone(&health));

    // --- Background tasks ---

    // Auto-refresh (optional)
    if cfg.auto_refresh_secs > 0 {
        let refresher = AutoRefresher::new(
            Arc::clone(&pipeline),
            cfg.default_chain,
            cfg.default_criteria,
            cfg.result_limit,
            Duration::from_secs(cfg.auto_refresh_secs),
        );
        info!(
            chain = %cfg.default_chain,
            every_secs = cfg.auto_refresh_secs,
            "Auto-refresh enabled"
        );
        tokio::spawn(async move { refresher.run().await });
    }

    // Cache metrics reporter
    let report_cache = Arc::clone(&cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(CACHE_REPORT_INTERVAL_SECS));
        ticker.tick().await; // consume immediate first tick
        loop {
            ticker.tick().await;
            let m = report_cache.metrics();
            info!(
                entries = report_cache.len(),
                hits = m.hits,
                misses = m.misses,
                inserts = m.inserts,
                expirations = m.expirations,
                evictions = m.evictions,
                "[CACHE] hit_rate={:.1}%",
                hit_rate(m.hits, m.misses) * 100.0,
            );
        }
    });

    // --- HTTP API server ---
    let api_state = ApiState {
        pipeline,
        fetcher,
        health,
        latency,
        default_criteria: cfg.default_criteria,
        default_limit: cfg.result_limit,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
