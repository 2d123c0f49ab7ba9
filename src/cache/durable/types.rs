//! Type definitions for the durable tier

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{CacheEntry, CacheKey};

/// Metadata for an entry on disk, stored next to its data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub cache_key: CacheKey,
    pub size_bytes: u64,
    /// Wall-clock write time in milliseconds since UNIX epoch
    pub stored_at_ms: u64,
    /// Entry TTL in milliseconds; zero never expires
    pub ttl_ms: u64,
}

impl EntryMetadata {
    pub fn for_entry(cache_key: CacheKey, entry: &CacheEntry) -> Self {
        Self {
            cache_key,
            size_bytes: entry.payload.len() as u64,
            stored_at_ms: entry.stored_at_ms,
            ttl_ms: entry.ttl.as_millis() as u64,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Expired by its own TTL, or older than the tier-wide maximum age
    pub fn is_expired(&self, now: u64, max_age: Duration) -> bool {
        let age = now.saturating_sub(self.stored_at_ms);
        let own = self.ttl_ms > 0 && age > self.ttl_ms;
        let tier = !max_age.is_zero() && age > max_age.as_millis() as u64;
        own || tier
    }
}

/// Content of the schema version file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMarker {
    pub version: u32,
}
