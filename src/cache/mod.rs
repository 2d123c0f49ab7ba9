//! Tiered client cache
//!
//! Three tiers sit behind one `CacheManager`:
//! - `MemoryTier`: bounded in-process map, TTL-aware FIFO eviction
//! - `DurableTier`: file-backed store that survives restarts
//! - `ResponseCacheTier`: versioned buckets of URL-keyed JSON responses
//!
//! Every tier implements `CacheTier`; the manager chooses the order per
//! call and turns tier failures into misses.

pub mod config;
pub mod durable;
pub mod entry;
pub mod error;
pub mod janitor;
pub mod manager;
pub mod memory;
pub mod response;
pub mod stats;
pub mod traits;

pub use config::{
    CacheConfig, DurableTierConfig, MemoryTierConfig, NamespaceTtlConfig, ResponseTierConfig,
};
pub use durable::{DurableError, DurableTier};
pub use entry::{now_ms, CacheEntry, CacheKey, Namespace};
pub use error::CacheError;
pub use janitor::JanitorHandle;
pub use manager::{CacheManager, CacheStrategy, GetOptions, Priority, SetOptions, TierKind};
pub use memory::MemoryTier;
pub use response::{CachedResponse, ResponseCacheTier};
pub use stats::{CacheStats, CacheStatsTracker, ManagerStats};
pub use traits::CacheTier;
