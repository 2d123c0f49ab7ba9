//! Tier counters
//!
//! Each tier keeps a `CacheStatsTracker` and reports a `CacheStats` snapshot
//! combined with its current size. `ManagerStats` groups the snapshots of
//! every tier the manager owns.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters of one tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that found nothing usable, expired entries included
    pub misses: u64,
    /// Live entries dropped to stay within capacity
    pub evictions: u64,
    /// Entries dropped because their TTL ran out
    pub expirations: u64,
    pub entries: u64,
    pub payload_bytes: u64,
}

impl CacheStats {
    /// Fraction of lookups answered by this tier, 0.0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Counters so far plus the tier's current size
    pub fn snapshot(&self, entries: u64, payload_bytes: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries,
            payload_bytes,
        }
    }
}

/// Snapshots of every tier owned by the cache manager
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    pub memory: CacheStats,
    /// `None` when the tier is disabled or could not be queried
    pub durable: Option<CacheStats>,
    pub response: Option<CacheStats>,
}

impl ManagerStats {
    fn tiers(&self) -> impl Iterator<Item = &CacheStats> {
        std::iter::once(&self.memory)
            .chain(self.durable.as_ref())
            .chain(self.response.as_ref())
    }

    /// Hits summed over the tiers that answered
    pub fn total_hits(&self) -> u64 {
        self.tiers().map(|s| s.hits).sum()
    }

    /// Entries summed over the tiers that answered
    pub fn total_entries(&self) -> u64 {
        self.tiers().map(|s| s.entries).sum()
    }
}
