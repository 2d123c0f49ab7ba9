//! Cache configuration types
//!
//! This module defines configuration structures for all cache tiers:
//! - Memory tier configuration
//! - Durable (file-backed) tier configuration
//! - Response tier configuration
//! - Per-namespace default TTLs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_TTL_SECONDS, DEFAULT_ASSETS_TTL_SECONDS, DEFAULT_CLEANUP_INTERVAL_SECONDS,
    DEFAULT_DURABLE_DIR, DEFAULT_DURABLE_MAX_AGE_SECONDS, DEFAULT_IMAGES_TTL_SECONDS,
    DEFAULT_MEMORY_MAX_ENTRIES, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_PAGES_TTL_SECONDS,
    DEFAULT_RESPONSE_CACHE_PREFIX, DEFAULT_RESPONSE_CACHE_VERSION, DEFAULT_RESPONSE_MAX_ENTRIES,
};

use super::entry::Namespace;

/// Main cache configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub memory: MemoryTierConfig,
    #[serde(default)]
    pub durable: DurableTierConfig,
    #[serde(default)]
    pub response: ResponseTierConfig,
    #[serde(default)]
    pub namespaces: NamespaceTtlConfig,
    /// Upper bound for a single durable or response tier call
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryTierConfig::default(),
            durable: DurableTierConfig::default(),
            response: ResponseTierConfig::default(),
            namespaces: NamespaceTtlConfig::default(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

impl CacheConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Default TTL for entries of a namespace
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        self.namespaces.ttl_for(namespace)
    }

    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        self.memory.validate()?;
        self.durable.validate()?;
        self.response.validate()?;

        if self.operation_timeout_ms == 0 {
            return Err("operation_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Memory tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTierConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    DEFAULT_MEMORY_MAX_ENTRIES
}

impl MemoryTierConfig {
    /// Validate memory tier configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("memory.max_entries must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Durable (file-backed) tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableTierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_durable_dir")]
    pub dir: PathBuf,
    /// Entries older than this are swept regardless of their own TTL
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for DurableTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_durable_dir(),
            max_age_seconds: default_max_age_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_durable_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DURABLE_DIR)
}

fn default_max_age_seconds() -> u64 {
    DEFAULT_DURABLE_MAX_AGE_SECONDS
}

fn default_cleanup_interval_seconds() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECONDS
}

impl DurableTierConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// Validate durable tier configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.dir.as_os_str().is_empty() {
            return Err("durable.dir cannot be empty when the durable tier is enabled".to_string());
        }
        if self.enabled && self.cleanup_interval_seconds == 0 {
            return Err("durable.cleanup_interval_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Response tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_response_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_response_version")]
    pub version: String,
    #[serde(default = "default_response_max_entries")]
    pub max_entries: u64,
}

impl Default for ResponseTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_prefix: default_response_prefix(),
            version: default_response_version(),
            max_entries: default_response_max_entries(),
        }
    }
}

fn default_response_prefix() -> String {
    DEFAULT_RESPONSE_CACHE_PREFIX.to_string()
}

fn default_response_version() -> String {
    DEFAULT_RESPONSE_CACHE_VERSION.to_string()
}

fn default_response_max_entries() -> u64 {
    DEFAULT_RESPONSE_MAX_ENTRIES
}

impl ResponseTierConfig {
    /// Name of the bucket for the configured version
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Validate response tier configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.cache_prefix.trim().is_empty() {
            return Err("response.cache_prefix cannot be empty".to_string());
        }
        if self.enabled && self.version.trim().is_empty() {
            return Err("response.version cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Default TTL per namespace, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceTtlConfig {
    #[serde(default = "default_api_ttl")]
    pub api: u64,
    #[serde(default = "default_images_ttl")]
    pub images: u64,
    #[serde(default = "default_pages_ttl")]
    pub pages: u64,
    #[serde(default = "default_assets_ttl")]
    pub assets: u64,
}

impl Default for NamespaceTtlConfig {
    fn default() -> Self {
        Self {
            api: default_api_ttl(),
            images: default_images_ttl(),
            pages: default_pages_ttl(),
            assets: default_assets_ttl(),
        }
    }
}

fn default_api_ttl() -> u64 {
    DEFAULT_API_TTL_SECONDS
}

fn default_images_ttl() -> u64 {
    DEFAULT_IMAGES_TTL_SECONDS
}

fn default_pages_ttl() -> u64 {
    DEFAULT_PAGES_TTL_SECONDS
}

fn default_assets_ttl() -> u64 {
    DEFAULT_ASSETS_TTL_SECONDS
}

impl NamespaceTtlConfig {
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        let seconds = match namespace {
            Namespace::Api => self.api,
            Namespace::Images => self.images,
            Namespace::Pages => self.pages,
            Namespace::Assets => self.assets,
        };
        Duration::from_secs(seconds)
    }
}
