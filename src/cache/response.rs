//! Response tier implementation
//!
//! Models the worker-side network cache: one named bucket per deployed
//! version, entries keyed by request URL and stored as JSON responses with
//! a `Cache-Control: max-age` hint. Buckets are backed by moka.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

use super::config::ResponseTierConfig;
use super::entry::{now_ms, CacheEntry, CacheKey, Namespace};
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::CacheTier;

/// Header carrying the original write time of a cached response
pub const CACHED_AT_HEADER: &str = "x-cached-at";

/// Header carrying the exact TTL in milliseconds; `max-age` is only a hint
pub const TTL_HEADER: &str = "x-ttl-ms";

/// `max-age` advertised for entries that never expire
const IMMUTABLE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Whole seconds for `max-age`, rounded up so a short TTL never reads as 0
fn max_age_hint(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return IMMUTABLE_MAX_AGE_SECS;
    }
    ttl.as_millis().div_ceil(1000) as u64
}

/// A serialized JSON response as stored in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: String,
    pub body: Bytes,
    pub headers: Vec<(String, String)>,
}

impl CachedResponse {
    /// Build a response for an entry, encoding TTL and write time as headers
    pub fn from_entry(url: String, entry: &CacheEntry) -> Self {
        let headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            (
                "cache-control".to_string(),
                format!("max-age={}", max_age_hint(entry.ttl)),
            ),
            (CACHED_AT_HEADER.to_string(), entry.stored_at_ms.to_string()),
            (TTL_HEADER.to_string(), entry.ttl.as_millis().to_string()),
        ];
        Self {
            url,
            body: entry.payload.clone(),
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `max-age` of the `cache-control` header, if present
    pub fn max_age(&self) -> Option<Duration> {
        self.header("cache-control")?
            .split(',')
            .filter_map(|directive| directive.trim().strip_prefix("max-age="))
            .find_map(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Exact TTL from `x-ttl-ms`, falling back to `max-age`
    pub fn ttl(&self) -> Option<Duration> {
        match self.header(TTL_HEADER) {
            Some(ms) => ms.parse::<u64>().ok().map(Duration::from_millis),
            None => self.max_age(),
        }
    }

    /// Convert back into a cache entry
    ///
    /// Responses without a write time or a readable TTL are unusable.
    pub fn to_entry(&self) -> Option<CacheEntry> {
        let stored_at_ms = self.header(CACHED_AT_HEADER)?.parse().ok()?;
        Some(CacheEntry::with_stored_at(
            self.body.clone(),
            stored_at_ms,
            self.ttl()?,
        ))
    }
}

type Bucket = moka::future::Cache<String, CachedResponse>;

/// Versioned response cache
pub struct ResponseCacheTier {
    prefix: String,
    max_entries: u64,
    active: RwLock<(String, Bucket)>,
    buckets: RwLock<HashMap<String, Bucket>>,
    stats: CacheStatsTracker,
}

impl ResponseCacheTier {
    pub fn new(config: &ResponseTierConfig) -> Self {
        let name = config.bucket_name();
        let bucket = Self::build_bucket(config.max_entries);
        let mut buckets = HashMap::new();
        buckets.insert(name.clone(), bucket.clone());

        Self {
            prefix: config.cache_prefix.clone(),
            max_entries: config.max_entries,
            active: RwLock::new((name, bucket)),
            buckets: RwLock::new(buckets),
            stats: CacheStatsTracker::new(),
        }
    }

    fn build_bucket(max_entries: u64) -> Bucket {
        moka::future::Cache::builder()
            .max_capacity(max_entries)
            .build()
    }

    /// Name of the bucket currently served
    pub fn active_bucket(&self) -> String {
        self.active.read().0.clone()
    }

    /// Names of every bucket still held
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open (creating if needed) the bucket of a version without activating it
    pub fn open_bucket(&self, version: &str) -> String {
        let name = format!("{}-{}", self.prefix, version);
        self.buckets
            .write()
            .entry(name.clone())
            .or_insert_with(|| Self::build_bucket(self.max_entries));
        name
    }

    /// Switch to the bucket of `version` and drop every other bucket
    ///
    /// Returns the names of the deleted buckets.
    pub fn activate_version(&self, version: &str) -> Vec<String> {
        let name = self.open_bucket(version);
        let mut buckets = self.buckets.write();
        let Some(bucket) = buckets.get(&name).cloned() else {
            return Vec::new();
        };

        let stale: Vec<String> = buckets.keys().filter(|k| **k != name).cloned().collect();
        for old in &stale {
            if let Some(old_bucket) = buckets.remove(old) {
                old_bucket.invalidate_all();
            }
        }
        *self.active.write() = (name.clone(), bucket);

        if !stale.is_empty() {
            tracing::info!(active = %name, deleted = ?stale, "Deleted stale response buckets");
        }
        stale
    }

    fn bucket(&self) -> Bucket {
        self.active.read().1.clone()
    }

    /// Raw response lookup by URL in the active bucket
    pub async fn match_url(&self, url: &str) -> Option<CachedResponse> {
        self.bucket().get(url).await
    }
}

#[async_trait]
impl CacheTier for ResponseCacheTier {
    fn name(&self) -> &'static str {
        "response"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let bucket = self.bucket();
        let url = key.request_url();

        let entry = match bucket.get(&url).await.map(|r| r.to_entry()) {
            Some(Some(entry)) if !entry.is_expired_at(now_ms()) => entry,
            Some(_) => {
                bucket.invalidate(&url).await;
                self.stats.record_expired(1);
                self.stats.record_miss();
                return Ok(None);
            }
            None => {
                self.stats.record_miss();
                return Ok(None);
            }
        };

        self.stats.record_hit();
        Ok(Some(entry))
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let url = key.request_url();
        let response = CachedResponse::from_entry(url.clone(), &entry);
        self.bucket().insert(url, response).await;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.bucket().remove(&key.request_url()).await.is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let buckets: Vec<Bucket> = self.buckets.read().values().cloned().collect();
        for bucket in &buckets {
            bucket.invalidate_all();
            bucket.run_pending_tasks().await;
        }
        Ok(())
    }

    async fn clear_namespace(&self, namespace: Namespace) -> Result<usize, CacheError> {
        let bucket = self.bucket();
        let prefix = format!("/{}/", namespace);
        let urls: Vec<String> = bucket
            .iter()
            .filter(|(url, _)| url.starts_with(&prefix))
            .map(|(url, _)| (*url).clone())
            .collect();

        for url in &urls {
            bucket.invalidate(url).await;
        }
        bucket.run_pending_tasks().await;
        Ok(urls.len())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let bucket = self.bucket();
        let now = now_ms();
        let expired: Vec<String> = bucket
            .iter()
            .filter(|(_, response)| {
                response
                    .to_entry()
                    .map_or(true, |entry| entry.is_expired_at(now))
            })
            .map(|(url, _)| (*url).clone())
            .collect();

        for url in &expired {
            bucket.invalidate(url).await;
        }
        bucket.run_pending_tasks().await;
        self.stats.record_expired(expired.len() as u64);
        Ok(expired.len())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let bucket = self.bucket();
        bucket.run_pending_tasks().await;
        Ok(self
            .stats
            .snapshot(bucket.entry_count(), bucket.weighted_size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier() -> ResponseCacheTier {
        ResponseCacheTier::new(&ResponseTierConfig::default())
    }

    fn entry(v: &str) -> CacheEntry {
        CacheEntry::new(Bytes::from(v.to_string()), Duration::from_secs(120))
    }

    #[test]
    fn test_response_headers_round_trip_entry() {
        let entry = CacheEntry::with_stored_at(Bytes::from("{}"), 42, Duration::from_secs(300));
        let response = CachedResponse::from_entry("/api/news".to_string(), &entry);

        assert_eq!(response.header("Cache-Control"), Some("max-age=300"));
        assert_eq!(response.max_age(), Some(Duration::from_secs(300)));
        assert_eq!(response.to_entry(), Some(entry));
    }

    #[test]
    fn test_sub_second_ttl_is_kept_exactly() {
        for ttl_ms in [1, 500, 1999] {
            let entry =
                CacheEntry::with_stored_at(Bytes::from("{}"), 1_000, Duration::from_millis(ttl_ms));
            let response = CachedResponse::from_entry("/api/news".to_string(), &entry);

            assert_ne!(response.header("cache-control"), Some("max-age=0"));
            let restored = response.to_entry().unwrap();
            assert_eq!(restored.ttl, Duration::from_millis(ttl_ms));
            assert!(restored.is_expired_at(1_000 + ttl_ms + 1));
        }
        let half = CachedResponse::from_entry(
            "/x".to_string(),
            &CacheEntry::with_stored_at(Bytes::new(), 0, Duration::from_millis(500)),
        );
        assert_eq!(half.max_age(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_ttl_never_expires_after_round_trip() {
        let entry = CacheEntry::with_stored_at(Bytes::from("{}"), 0, Duration::ZERO);
        let restored = CachedResponse::from_entry("/x".to_string(), &entry)
            .to_entry()
            .unwrap();
        assert_eq!(restored.ttl, Duration::ZERO);
        assert!(!restored.is_expired_at(u64::MAX / 2));
    }

    #[tokio::test]
    async fn test_clear_empties_every_bucket() {
        let tier = tier();
        let key = CacheKey::new(Namespace::Api, "news");
        let staged = tier.open_bucket("v2");
        let bucket = tier.buckets.read().get(&staged).cloned().unwrap();
        bucket
            .insert(
                key.request_url(),
                CachedResponse::from_entry(key.request_url(), &entry("2")),
            )
            .await;
        tier.set(key.clone(), entry("1")).await.unwrap();

        tier.clear().await.unwrap();

        assert!(tier.get(&key).await.unwrap().is_none());
        tier.activate_version("v2");
        assert!(tier.get(&key).await.unwrap().is_none());
    }

    #[test]
    fn test_max_age_parses_among_other_directives() {
        let response = CachedResponse {
            url: "/x".to_string(),
            body: Bytes::new(),
            headers: vec![(
                "cache-control".to_string(),
                "public, max-age=60, immutable".to_string(),
            )],
        };
        assert_eq!(response.max_age(), Some(Duration::from_secs(60)));
        // no write time, cannot be trusted
        assert_eq!(response.to_entry(), None);
    }

    #[tokio::test]
    async fn test_set_and_get_by_url() {
        let tier = tier();
        let key = CacheKey::new(Namespace::Api, "clubs");
        tier.set(key.clone(), entry("[1,2]")).await.unwrap();

        let found = tier.get(&key).await.unwrap().unwrap();
        assert_eq!(found.payload, Bytes::from("[1,2]"));
        assert!(tier.match_url("/api/clubs").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_response_is_absent() {
        let tier = tier();
        let key = CacheKey::new(Namespace::Api, "old");
        let stale = CacheEntry::with_stored_at(Bytes::from("1"), 0, Duration::from_secs(1));
        tier.set(key.clone(), stale).await.unwrap();

        assert!(tier.get(&key).await.unwrap().is_none());
        assert!(tier.match_url("/api/old").await.is_none());
    }

    #[tokio::test]
    async fn test_activate_version_drops_other_buckets() {
        let tier = tier();
        let key = CacheKey::new(Namespace::Api, "news");
        tier.set(key.clone(), entry("1")).await.unwrap();

        let deleted = tier.activate_version("v2");
        assert_eq!(deleted, vec!["portal-api-v1".to_string()]);
        assert_eq!(tier.active_bucket(), "portal-api-v2");
        assert_eq!(tier.bucket_names(), vec!["portal-api-v2".to_string()]);
        assert!(tier.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_namespace_only_touches_prefix() {
        let tier = tier();
        tier.set(CacheKey::new(Namespace::Images, "a"), entry("1"))
            .await
            .unwrap();
        tier.set(CacheKey::new(Namespace::Pages, "a"), entry("2"))
            .await
            .unwrap();

        assert_eq!(tier.clear_namespace(Namespace::Images).await.unwrap(), 1);
        assert!(tier
            .get(&CacheKey::new(Namespace::Pages, "a"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let tier = tier();
        let key = CacheKey::new(Namespace::Assets, "app.js");
        tier.set(key.clone(), entry("js")).await.unwrap();
        assert!(tier.delete(&key).await.unwrap());
        assert!(!tier.delete(&key).await.unwrap());

        tier.set(key.clone(), entry("js")).await.unwrap();
        tier.clear().await.unwrap();
        assert!(tier.get(&key).await.unwrap().is_none());
    }
}
