//! Cache manager - one async API over the memory, durable and response tiers
//!
//! The manager picks the tier order per call, writes hits from slower tiers
//! back into the faster tiers it already checked, and never lets a broken
//! tier reach the caller: failures and timeouts are logged and read as a
//! miss.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::config::CacheConfig;
use super::durable::DurableTier;
use super::entry::{CacheEntry, CacheKey, Namespace};
use super::error::CacheError;
use super::janitor::JanitorHandle;
use super::memory::MemoryTier;
use super::response::ResponseCacheTier;
use super::stats::ManagerStats;
use super::traits::CacheTier;

/// Which tier is consulted first on reads, and which extra tier is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// memory → durable → response; writes go to memory only
    #[default]
    #[serde(alias = "memory-first")]
    Memory,
    /// durable → memory → response; writes also go to the durable tier
    #[serde(alias = "persistent-first")]
    Persistent,
    /// response → memory → durable; writes also go to the response tier
    #[serde(alias = "service-worker-first")]
    ServiceWorker,
}

impl CacheStrategy {
    /// Tier read order for this strategy
    pub fn read_order(&self) -> [TierKind; 3] {
        match self {
            CacheStrategy::Memory => [TierKind::Memory, TierKind::Durable, TierKind::Response],
            CacheStrategy::Persistent => [TierKind::Durable, TierKind::Memory, TierKind::Response],
            CacheStrategy::ServiceWorker => {
                [TierKind::Response, TierKind::Memory, TierKind::Durable]
            }
        }
    }
}

/// Identifies one of the manager's tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Memory,
    Durable,
    Response,
}

/// Write priority; high-priority writes always reach the durable tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Options of `CacheManager::set` and `CacheManager::preload_data`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub namespace: Namespace,
    /// Falls back to the namespace default when `None`
    pub ttl: Option<Duration>,
    pub strategy: CacheStrategy,
    pub priority: Priority,
}

impl SetOptions {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Default::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Read options matching these write options
    pub fn read_options(&self) -> GetOptions {
        GetOptions {
            namespace: self.namespace,
            strategy: self.strategy,
        }
    }
}

/// Options of `CacheManager::get`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub namespace: Namespace,
    pub strategy: CacheStrategy,
}

impl GetOptions {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Default::default()
        }
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Facade over the three cache tiers
///
/// Construct once at startup and share it as `Arc<CacheManager>`.
pub struct CacheManager {
    config: CacheConfig,
    memory: MemoryTier,
    durable: Option<Arc<dyn CacheTier>>,
    response: Option<Arc<ResponseCacheTier>>,
    op_timeout: Duration,
}

impl CacheManager {
    /// Build the manager and its tiers from configuration
    ///
    /// A durable tier that cannot be opened is logged and left out; the
    /// manager then behaves as if that tier were always empty.
    pub async fn from_config(config: CacheConfig) -> Self {
        let durable: Option<Arc<dyn CacheTier>> = if config.durable.enabled {
            match DurableTier::open(&config.durable).await {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        dir = %config.durable.dir.display(),
                        "Durable cache tier unavailable, continuing without it"
                    );
                    None
                }
            }
        } else {
            None
        };

        let response = config
            .response
            .enabled
            .then(|| Arc::new(ResponseCacheTier::new(&config.response)));

        Self::with_tiers(config, durable, response)
    }

    /// Build the manager around explicitly provided slower tiers
    pub fn with_tiers(
        config: CacheConfig,
        durable: Option<Arc<dyn CacheTier>>,
        response: Option<Arc<ResponseCacheTier>>,
    ) -> Self {
        Self {
            memory: MemoryTier::new(&config.memory),
            op_timeout: config.operation_timeout(),
            config,
            durable,
            response,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub fn durable(&self) -> Option<&Arc<dyn CacheTier>> {
        self.durable.as_ref()
    }

    pub fn response(&self) -> Option<&Arc<ResponseCacheTier>> {
        self.response.as_ref()
    }

    fn tier(&self, kind: TierKind) -> Option<&dyn CacheTier> {
        match kind {
            TierKind::Memory => Some(&self.memory as &dyn CacheTier),
            TierKind::Durable => self.durable.as_deref(),
            TierKind::Response => self.response.as_deref().map(|t| t as &dyn CacheTier),
        }
    }

    /// Run a tier call under the operation timeout; failures become `None`
    async fn guarded<T, F>(&self, tier: &'static str, op: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let err = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout {
                tier,
                timeout_ms: self.op_timeout.as_millis() as u64,
            },
        };
        tracing::warn!(tier = tier, op = op, error = %err, "Cache tier operation failed");
        None
    }

    async fn tier_get(&self, kind: TierKind, key: &CacheKey) -> Option<CacheEntry> {
        let tier = self.tier(kind)?;
        self.guarded(tier.name(), "get", tier.get(key)).await.flatten()
    }

    async fn tier_set(&self, kind: TierKind, key: &CacheKey, entry: &CacheEntry) {
        if let Some(tier) = self.tier(kind) {
            self.guarded(tier.name(), "set", tier.set(key.clone(), entry.clone()))
                .await;
        }
    }

    /// Store a value; best effort, never fails
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) {
        let payload = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Cannot serialize cache payload");
                return;
            }
        };

        let ttl = options
            .ttl
            .unwrap_or_else(|| self.config.ttl_for(options.namespace));
        let cache_key = CacheKey::new(options.namespace, key);
        let entry = CacheEntry::new(payload.into(), ttl);

        self.tier_set(TierKind::Memory, &cache_key, &entry).await;

        if options.priority == Priority::High || options.strategy == CacheStrategy::Persistent {
            self.tier_set(TierKind::Durable, &cache_key, &entry).await;
        }
        if options.strategy == CacheStrategy::ServiceWorker {
            self.tier_set(TierKind::Response, &cache_key, &entry).await;
        }

        tracing::debug!(key = %cache_key, strategy = ?options.strategy, "Cache set");
    }

    /// Look a value up in strategy order; `None` on miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: GetOptions) -> Option<T> {
        let cache_key = CacheKey::new(options.namespace, key);
        let entry = self.lookup(&cache_key, options.strategy).await?;

        match serde_json::from_slice(&entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "Cached payload does not match requested type");
                None
            }
        }
    }

    /// Raw entry lookup with write-back into the tiers checked before the hit
    pub async fn lookup(&self, key: &CacheKey, strategy: CacheStrategy) -> Option<CacheEntry> {
        let order = strategy.read_order();

        for (position, kind) in order.iter().enumerate() {
            let Some(entry) = self.tier_get(*kind, key).await else {
                continue;
            };

            for faster in &order[..position] {
                self.tier_set(*faster, key, &entry).await;
            }
            tracing::debug!(key = %key, tier = ?kind, written_back = position, "Cache hit");
            return Some(entry);
        }

        tracing::debug!(key = %key, "Cache miss");
        None
    }

    /// Remove a key from every tier
    pub async fn delete(&self, key: &str, namespace: Namespace) {
        let cache_key = CacheKey::new(namespace, key);
        for kind in [TierKind::Memory, TierKind::Durable, TierKind::Response] {
            if let Some(tier) = self.tier(kind) {
                self.guarded(tier.name(), "delete", tier.delete(&cache_key))
                    .await;
            }
        }
    }

    /// Clear one namespace, or every tier entirely when `namespace` is `None`
    pub async fn clear(&self, namespace: Option<Namespace>) {
        for kind in [TierKind::Memory, TierKind::Durable, TierKind::Response] {
            let Some(tier) = self.tier(kind) else {
                continue;
            };
            match namespace {
                Some(ns) => {
                    self.guarded(tier.name(), "clear_namespace", tier.clear_namespace(ns))
                        .await;
                }
                None => {
                    self.guarded(tier.name(), "clear", tier.clear()).await;
                }
            }
        }
        tracing::info!(namespace = ?namespace, "Cache cleared");
    }

    /// Cache-aside: return the cached value or fetch, store and return it
    ///
    /// Errors of `fetcher` are returned unchanged and nothing is stored.
    pub async fn preload_data<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: SetOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key, options.read_options()).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Sweep expired entries from every tier; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for kind in [TierKind::Memory, TierKind::Durable, TierKind::Response] {
            if let Some(tier) = self.tier(kind) {
                removed += self
                    .guarded(tier.name(), "purge_expired", tier.purge_expired())
                    .await
                    .unwrap_or(0);
            }
        }
        removed
    }

    /// Switch the response tier to the bucket of a newly deployed version
    pub fn activate_response_version(&self, version: &str) -> Vec<String> {
        self.response
            .as_ref()
            .map(|tier| tier.activate_version(version))
            .unwrap_or_default()
    }

    /// Start the background sweep of the durable tier
    ///
    /// Returns `None` when there is no durable tier to sweep.
    pub fn spawn_janitor(&self) -> Option<JanitorHandle> {
        let tier = self.durable.clone()?;
        Some(JanitorHandle::spawn(
            tier,
            self.config.durable.cleanup_interval(),
        ))
    }

    pub async fn stats(&self) -> ManagerStats {
        let memory = self
            .guarded("memory", "stats", CacheTier::stats(&self.memory))
            .await
            .unwrap_or_default();
        let durable = match self.durable.as_deref() {
            Some(tier) => self.guarded(tier.name(), "stats", tier.stats()).await,
            None => None,
        };
        let response = match self.response.as_deref() {
            Some(tier) => self.guarded(tier.name(), "stats", tier.stats()).await,
            None => None,
        };
        ManagerStats {
            memory,
            durable,
            response,
        }
    }
}
