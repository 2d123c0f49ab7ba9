//! Memory tier implementation
//!
//! Bounded in-process map with TTL-aware FIFO eviction: when the entry
//! limit is exceeded, expired entries go first, then the oldest writes.
//! Reads never refresh an entry's position.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::config::MemoryTierConfig;
use super::entry::{now_ms, CacheEntry, CacheKey, Namespace};
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::CacheTier;

struct Slot {
    entry: CacheEntry,
    seq: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<CacheKey, Slot>,
    // write order: seq -> key
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.entry)
    }

    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.remove(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, Slot { entry, seq });
    }

    fn purge_expired(&mut self, now: u64) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn size_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|slot| slot.entry.size_bytes() as u64)
            .sum()
    }
}

/// In-process tier, always written by the cache manager
pub struct MemoryTier {
    state: Mutex<MemoryState>,
    stats: Arc<CacheStatsTracker>,
    max_entries: usize,
}

impl MemoryTier {
    /// Create a new MemoryTier from configuration
    pub fn new(config: &MemoryTierConfig) -> Self {
        Self::with_capacity(config.max_entries)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            stats: Arc::new(CacheStatsTracker::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of entries currently held, expired ones included
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists, without touching hit/miss counters
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = now_ms();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired_at(now))
    }

    fn enforce_limit(&self, state: &mut MemoryState) {
        if state.entries.len() <= self.max_entries {
            return;
        }

        let purged = state.purge_expired(now_ms());
        let mut evicted = 0;
        while state.entries.len() > self.max_entries {
            match state.evict_oldest() {
                Some(key) => {
                    tracing::debug!(key = %key, "Memory tier evicted oldest entry");
                    evicted += 1;
                }
                None => break,
            }
        }
        self.stats.record_expired(purged as u64);
        self.stats.record_evicted(evicted);
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let now = now_ms();
        let mut state = self.state.lock();

        let expired = match state.entries.get(key) {
            Some(slot) if !slot.entry.is_expired_at(now) => {
                self.stats.record_hit();
                return Ok(Some(slot.entry.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            self.stats.record_expired(1);
        }
        self.stats.record_miss();
        Ok(None)
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        state.insert(key, entry);
        self.enforce_limit(&mut state);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.state.lock().remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        Ok(())
    }

    async fn clear_namespace(&self, namespace: Namespace) -> Result<usize, CacheError> {
        let mut state = self.state.lock();
        let keys: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|k| k.namespace == namespace)
            .cloned()
            .collect();
        for key in &keys {
            state.remove(key);
        }
        Ok(keys.len())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let purged = self.state.lock().purge_expired(now_ms());
        self.stats.record_expired(purged as u64);
        Ok(purged)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let state = self.state.lock();
        Ok(self
            .stats
            .snapshot(state.entries.len() as u64, state.size_bytes()))
    }
}
