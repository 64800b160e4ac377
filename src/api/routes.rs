use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::LatencyStats;
use crate::chains::{registry, Blockchain, ChainInfo};
use crate::error::{AppError, Result};
use crate::fetcher::PairFetcher;
use crate::pipeline::SearchPipeline;
use crate::types::{FilterCriteria, SearchOutcome, TradingPair};

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<SearchPipeline>,
    pub fetcher: Arc<PairFetcher>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub default_criteria: FilterCriteria,
    pub default_limit: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/chains", get(get_chains))
        .route("/api/pairs/:chain", get(search_pairs))
        .route("/api/pairs/:chain/latest", get(get_latest_pairs))
        .route("/api/dexscreener/tokens/:address", get(get_token_pairs))
        .route("/api/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Unset bounds fall back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PairsQuery {
    pub min_market_cap: Option<u64>,
    pub max_market_cap: Option<u64>,
    pub min_age: Option<u64>,
    pub max_age: Option<u64>,
    pub min_liquidity: Option<u64>,
    pub max_liquidity: Option<u64>,
    pub limit: Option<usize>,
}

impl PairsQuery {
    fn criteria(&self, d: FilterCriteria) -> FilterCriteria {
        FilterCriteria {
            min_market_cap: self.min_market_cap.unwrap_or(d.min_market_cap),
            max_market_cap: self.max_market_cap.unwrap_or(d.max_market_cap),
            min_age: self.min_age.unwrap_or(d.min_age),
            max_age: self.max_age.unwrap_or(d.max_age),
            min_liquidity: self.min_liquidity.unwrap_or(d.min_liquidity),
            max_liquidity: self.max_liquidity.unwrap_or(d.max_liquidity),
        }
    }
}

/// Whitelisted parameters for the token relay; anything else is dropped.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "chainId")]
    pub chain_id: Option<String>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TokenPairsResponse {
    pub pairs: Vec<TradingPair>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_chains() -> Json<&'static [ChainInfo]> {
    Json(registry())
}

async fn search_pairs(
    State(state): State<ApiState>,
    Path(chain): Path<String>,
    Query(params): Query<PairsQuery>,
) -> Result<Json<SearchOutcome>> {
    let chain: Blockchain = chain.parse()?;
    let criteria = params.criteria(state.default_criteria);
    let limit = params.limit.unwrap_or(state.default_limit);

    info!(chain = %chain, ?criteria, limit, "search requested");
    let outcome = state.pipeline.run(chain, criteria, limit).await?;
    Ok(Json(outcome))
}

async fn get_latest_pairs(
    State(state): State<ApiState>,
    Path(chain): Path<String>,
) -> Result<Json<SearchOutcome>> {
    let chain: Blockchain = chain.parse()?;
    let latest = state
        .pipeline
        .store()
        .latest(chain)
        .ok_or_else(|| AppError::NotFound(format!("no published search for {chain}")))?;
    Ok(Json(SearchOutcome::clone(&latest)))
}

async fn get_token_pairs(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Query(params): Query<TokenQuery>,
) -> Result<Json<TokenPairsResponse>> {
    let chain = params
        .chain_id
        .as_deref()
        .map(str::parse::<Blockchain>)
        .transpose()?;

    let mut pairs = state.fetcher.lookup_token(&address).await?;
    if let Some(chain) = chain {
        pairs.retain(|p| p.chain_id.as_deref() == Some(chain.chain_id()));
    }
    if let Some(limit) = params.limit {
        pairs.truncate(limit);
    }
    Ok(Json(TokenPairsResponse { pairs }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms,
        p95_ms,
        p99_ms,
    })
}
