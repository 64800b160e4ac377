use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::chains::Blockchain;
use crate::types::TradingPair;

/// Key/value store with per-entry TTL, consumed by the fan-out. Purely an
/// optimisation: implementations must never fail the caller.
pub trait PairCache: Send + Sync {
    /// None when the key is missing or its entry has expired.
    fn get(&self, key: &str) -> Option<Vec<TradingPair>>;

    /// Overwrites any existing entry at `key`.
    fn set(&self, key: &str, value: Vec<TradingPair>, ttl: Duration);
}

/// `{namespace}:{chain}:{term}` with the term lowercased and trimmed.
pub fn cache_key(namespace: &str, chain: Blockchain, term: &str) -> String {
    format!("{namespace}:{}:{}", chain.chain_id(), term.trim().to_lowercase())
}

// ---------------------------------------------------------------------------
// MemoryPairCache: TTL + LRU capacity bound
// ---------------------------------------------------------------------------

struct CacheEntry {
    value: Vec<TradingPair>,
    expires_at: Instant,
    /// Logical clock value of the last read or write.
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub inserts: u64,
}

pub struct MemoryPairCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    clock: AtomicU64,
    /// Serialises inserts so the capacity bound holds under concurrent writers.
    insert_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    inserts: AtomicU64,
}

impl MemoryPairCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            insert_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drop expired entries first; if still at capacity, drop the least
    /// recently used one. Caller holds `insert_lock`.
    fn make_room(&self) {
        if self.entries.len() < self.capacity {
            return;
        }

        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let expired = before - self.entries.len();
        if expired > 0 {
            self.expirations.fetch_add(expired as u64, Ordering::Relaxed);
        }

        while self.entries.len() >= self.capacity {
            let lru = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            let Some(key) = lru else { break };
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache evicted LRU entry");
        }
    }
}

impl PairCache for MemoryPairCache {
    fn get(&self, key: &str) -> Option<Vec<TradingPair>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the shard lock: a writer may have refreshed it.
            if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn set(&self, key: &str, value: Vec<TradingPair>, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            warn!(key = %key, ?ttl, "cache TTL overflow, entry not stored");
            return;
        };
        let entry = CacheEntry {
            value,
            expires_at,
            last_access: AtomicU64::new(self.tick()),
        };

        let _guard = match self.insert_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.entries.contains_key(key) {
            self.make_room();
        }
        self.entries.insert(key.to_string(), entry);
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }
}
