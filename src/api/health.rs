//! Shared health state for the /api/health endpoint.
//! Updated by PairFetcher and SearchPipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared health counters. Updated by pipeline components, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Pipeline runs that published a result.
    pub searches_completed: AtomicU64,
    /// Pipeline runs dropped because a newer search started.
    pub searches_superseded: AtomicU64,
    /// Terms whose proxies were all exhausted.
    pub terms_failed: AtomicU64,
    /// Unix milliseconds of the last published search (0 = none).
    pub last_search_at_ms: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub searches_completed: u64,
    pub searches_superseded: u64,
    pub terms_failed: u64,
    pub last_search_at_ms: Option<u64>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self, at_ms: u64) {
        self.searches_completed.fetch_add(1, Ordering::Relaxed);
        self.last_search_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn inc_superseded(&self) {
        self.searches_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_terms_failed(&self) {
        self.terms_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_search_at_ms.load(Ordering::Relaxed);
        HealthSnapshot {
            status: "ok",
            searches_completed: self.searches_completed.load(Ordering::Relaxed),
            searches_superseded: self.searches_superseded.load(Ordering::Relaxed),
            terms_failed: self.terms_failed.load(Ordering::Relaxed),
            last_search_at_ms: (last > 0).then_some(last),
        }
    }
}
