use std::time::Duration;

use crate::chains::Blockchain;
use crate::error::{AppError, Result};
use crate::fetcher::matcher::ChainMatch;
use crate::types::FilterCriteria;

pub const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com";

/// Relay URL templates, tried in order. `{url}` is replaced by the
/// percent-encoded target URL; a bare `{url}` is a direct call.
pub const DEFAULT_CORS_PROXIES: &[&str] = &[
    "{url}",
    "https://api.allorigins.win/get?url={url}",
    "https://corsproxy.io/?url={url}",
];

/// Cache namespace for search-term results.
pub const SEARCH_CACHE_NAMESPACE: &str = "dexsearch";

/// Default per-attempt HTTP timeout (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fixed delay between proxy attempts for one term (milliseconds).
pub const RETRY_DELAY_MS: u64 = 500;

/// Maximum search terms in flight at once.
pub const FETCH_CONCURRENCY: usize = 8;

/// TTL for a successfully fetched term (seconds).
pub const CACHE_TTL_SECS: u64 = 300;

/// TTL for a term whose proxies were all exhausted (seconds). Short so a
/// flaky relay is retried soon, long enough to stop hot-looping.
pub const CACHE_FAILURE_TTL_SECS: u64 = 60;

/// LRU capacity of the term cache.
pub const CACHE_CAPACITY: usize = 2_000;

/// Default number of ranked pairs returned by a search.
pub const RESULT_LIMIT: usize = 100;

/// Pipeline auto-refresh interval (seconds). 0 disables it.
pub const AUTO_REFRESH_SECS: u64 = 0;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub proxies: Vec<String>,
    pub log_level: String,
    pub api_port: u16,
    /// Max concurrent term fetches (FETCH_CONCURRENCY)
    pub fetch_concurrency: usize,
    /// Per-attempt timeout (REQUEST_TIMEOUT_SECS)
    pub request_timeout: Duration,
    /// Delay between proxy attempts (RETRY_DELAY_MS)
    pub retry_delay: Duration,
    pub cache_ttl: Duration,
    pub cache_failure_ttl: Duration,
    pub cache_capacity: usize,
    pub result_limit: usize,
    pub chain_match: ChainMatch,
    /// 0 = disabled (AUTO_REFRESH_SECS)
    pub auto_refresh_secs: u64,
    /// Chain refreshed by the background task (DEFAULT_CHAIN)
    pub default_chain: Blockchain,
    /// Ranges used when a request leaves a bound unset (FILTER_*)
    pub default_criteria: FilterCriteria,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEXSCREENER_API_URL.to_string(),
            proxies: DEFAULT_CORS_PROXIES.iter().map(|p| p.to_string()).collect(),
            log_level: "info".to_string(),
            api_port: 3000,
            fetch_concurrency: FETCH_CONCURRENCY,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            cache_failure_ttl: Duration::from_secs(CACHE_FAILURE_TTL_SECS),
            cache_capacity: CACHE_CAPACITY,
            result_limit: RESULT_LIMIT,
            chain_match: ChainMatch::Loose,
            auto_refresh_secs: AUTO_REFRESH_SECS,
            default_chain: Blockchain::Solana,
            default_criteria: FilterCriteria::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let proxies: Vec<String> = match std::env::var("CORS_PROXIES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.proxies.clone(),
        };
        if proxies.is_empty() {
            return Err(AppError::Config("CORS_PROXIES must list at least one proxy".to_string()));
        }
        if let Some(bad) = proxies.iter().find(|p| !p.contains("{url}")) {
            return Err(AppError::Config(format!("proxy template without {{url}}: {bad}")));
        }

        let default_chain = match std::env::var("DEFAULT_CHAIN") {
            Ok(raw) => raw.parse::<Blockchain>()?,
            Err(_) => defaults.default_chain,
        };

        let chain_match = match std::env::var("CHAIN_MATCH") {
            Ok(raw) => raw.parse::<ChainMatch>()?,
            Err(_) => defaults.chain_match,
        };

        let fetch_concurrency = env_parse("FETCH_CONCURRENCY", defaults.fetch_concurrency);
        if fetch_concurrency == 0 {
            return Err(AppError::Config("FETCH_CONCURRENCY must be at least 1".to_string()));
        }

        let d = defaults.default_criteria;
        let default_criteria = FilterCriteria {
            min_market_cap: env_parse("FILTER_MIN_MARKET_CAP", d.min_market_cap),
            max_market_cap: env_parse("FILTER_MAX_MARKET_CAP", d.max_market_cap),
            min_age: env_parse("FILTER_MIN_AGE_DAYS", d.min_age),
            max_age: env_parse("FILTER_MAX_AGE_DAYS", d.max_age),
            min_liquidity: env_parse("FILTER_MIN_LIQUIDITY", d.min_liquidity),
            max_liquidity: env_parse("FILTER_MAX_LIQUIDITY", d.max_liquidity),
        };

        Ok(Self {
            api_url: std::env::var("DEXSCREENER_API_URL")
                .unwrap_or_else(|_| DEXSCREENER_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            proxies,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            fetch_concurrency,
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)),
            retry_delay: Duration::from_millis(env_parse("RETRY_DELAY_MS", RETRY_DELAY_MS)),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", CACHE_TTL_SECS)),
            cache_failure_ttl: Duration::from_secs(env_parse(
                "CACHE_FAILURE_TTL_SECS",
                CACHE_FAILURE_TTL_SECS,
            )),
            cache_capacity: env_parse("CACHE_CAPACITY", CACHE_CAPACITY),
            result_limit: env_parse("RESULT_LIMIT", RESULT_LIMIT),
            chain_match,
            auto_refresh_secs: env_parse("AUTO_REFRESH_SECS", AUTO_REFRESH_SECS),
            default_chain,
            default_criteria,
        })
    }
}

/// Unset or unparseable values fall back to the default.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
