//! Filter & Rank: pure range filter over merged candidates, stable sort by
//! market cap descending, truncate to the limit.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{FilterCriteria, FilterStats, TradingPair};

/// `pairCreatedAt` values below this are seconds, not milliseconds.
/// 1e12 ms is 2001-09-09; 1e12 s is far in the future, so a real timestamp
/// in either unit lands on the correct side. A millisecond value from before
/// 2001 would be misread as seconds and then rejected as a future date.
pub const MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

pub const MS_PER_DAY: f64 = 86_400_000.0;

enum Rejection {
    NoMarketCap,
    BadAge,
    NoLiquidity,
    MarketCapRange,
    AgeRange,
    LiquidityRange,
}

/// `marketCap` when present and non-zero, otherwise `fdv`.
pub fn effective_market_cap(pair: &TradingPair) -> Option<f64> {
    match pair.market_cap {
        Some(mc) if mc.is_finite() && mc != 0.0 => Some(mc),
        _ => pair.fdv.filter(|f| f.is_finite()),
    }
}

/// Normalise to milliseconds. Missing, non-finite and non-positive values
/// are unusable.
pub fn normalize_created_at_ms(raw: Option<f64>) -> Option<f64> {
    let ts = raw.filter(|t| t.is_finite() && *t > 0.0)?;
    if ts < MILLIS_THRESHOLD {
        Some(ts * 1000.0)
    } else {
        Some(ts)
    }
}

/// Age in fractional days at `now_ms`. None for unusable timestamps and for
/// a non-positive age (created now or in the future).
pub fn effective_age_days(pair: &TradingPair, now_ms: f64) -> Option<f64> {
    let created_ms = normalize_created_at_ms(pair.pair_created_at)?;
    let age = (now_ms - created_ms) / MS_PER_DAY;
    (age > 0.0).then_some(age)
}

pub fn effective_liquidity(pair: &TradingPair) -> Option<f64> {
    pair.liquidity_usd().filter(|l| l.is_finite())
}

fn in_range(value: f64, min: u64, max: u64) -> bool {
    value >= min as f64 && value <= max as f64
}

/// Returns the effective market cap on a match, used as the sort key.
fn evaluate(pair: &TradingPair, criteria: &FilterCriteria, now_ms: f64) -> Result<f64, Rejection> {
    let market_cap = effective_market_cap(pair).ok_or(Rejection::NoMarketCap)?;
    let age = effective_age_days(pair, now_ms).ok_or(Rejection::BadAge)?;
    let liquidity = effective_liquidity(pair).ok_or(Rejection::NoLiquidity)?;

    if !in_range(market_cap, criteria.min_market_cap, criteria.max_market_cap) {
        return Err(Rejection::MarketCapRange);
    }
    if !in_range(age, criteria.min_age, criteria.max_age) {
        return Err(Rejection::AgeRange);
    }
    if !in_range(liquidity, criteria.min_liquidity, criteria.max_liquidity) {
        return Err(Rejection::LiquidityRange);
    }
    Ok(market_cap)
}

/// Filter, sort by effective market cap descending (ties keep input order)
/// and keep the first `limit`. Malformed records are rejected, never fatal.
pub fn filter_and_rank(
    candidates: Vec<TradingPair>,
    criteria: &FilterCriteria,
    limit: usize,
    now_ms: f64,
) -> (Vec<TradingPair>, FilterStats) {
    let mut stats = FilterStats {
        candidates: candidates.len(),
        ..FilterStats::default()
    };

    let mut ranked: Vec<(f64, TradingPair)> = Vec::new();
    for pair in candidates {
        match evaluate(&pair, criteria, now_ms) {
            Ok(market_cap) => ranked.push((market_cap, pair)),
            Err(rejection) => match rejection {
                Rejection::NoMarketCap => stats.rejected_no_market_cap += 1,
                Rejection::BadAge => stats.rejected_bad_age += 1,
                Rejection::NoLiquidity => stats.rejected_no_liquidity += 1,
                Rejection::MarketCapRange => stats.rejected_market_cap_range += 1,
                Rejection::AgeRange => stats.rejected_age_range += 1,
                Rejection::LiquidityRange => stats.rejected_liquidity_range += 1,
            },
        }
    }
    stats.matched = ranked.len();

    // Vec::sort_by is stable.
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    stats.truncated = ranked.len().saturating_sub(limit);
    ranked.truncate(limit);

    (ranked.into_iter().map(|(_, pair)| pair).collect(), stats)
}

pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}
