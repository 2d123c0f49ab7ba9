//! Cache tier trait definition
//!
//! This module defines the `CacheTier` trait that every backing store
//! (memory, durable, response) implements. The cache manager only talks
//! to tiers through this trait.

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey, Namespace};
use super::error::CacheError;
use super::stats::CacheStats;

/// A single backing store of the cache manager
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short tier name used in logs and stats
    fn name(&self) -> &'static str;

    /// Get a cache entry by key
    /// Returns None if the key is not found or the entry has expired
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Set a cache entry, overwriting any existing entry
    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Delete a cache entry by key
    /// Returns true if the entry was deleted, false if it didn't exist
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<(), CacheError>;

    /// Clear all cache entries of one namespace
    /// Returns the number of entries deleted
    async fn clear_namespace(&self, namespace: Namespace) -> Result<usize, CacheError>;

    /// Remove every expired entry
    /// Returns the number of entries removed
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    /// Get tier statistics
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}
