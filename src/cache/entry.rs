//! Cache key and entry types
//!
//! This module defines the core cache entry structures:
//! - `Namespace`: Logical partition of the cache (api, images, pages, assets)
//! - `CacheKey`: Unique identifier for cached payloads (namespace + key)
//! - `CacheEntry`: Serialized payload with the wall-clock metadata used for TTL

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since UNIX epoch
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Logical partition of the cache
///
/// Namespaces only matter for bulk clears and for picking a default TTL.
#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    #[default]
    Api,
    Images,
    Pages,
    Assets,
}

impl Namespace {
    /// All namespaces, in partition order
    pub const ALL: [Namespace; 4] = [
        Namespace::Api,
        Namespace::Images,
        Namespace::Pages,
        Namespace::Assets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Api => "api",
            Namespace::Images => "images",
            Namespace::Pages => "pages",
            Namespace::Assets => "assets",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Namespace::Api),
            "images" => Ok(Namespace::Images),
            "pages" => Ok(Namespace::Pages),
            "assets" => Ok(Namespace::Assets),
            other => Err(format!("Unknown cache namespace: '{}'", other)),
        }
    }
}

/// Cache key for identifying cached payloads
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Namespace the key lives in
    pub namespace: Namespace,
    /// Application-chosen key, e.g. `news:1`
    pub key: String,
}

impl CacheKey {
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Self {
        Self {
            namespace,
            key: key.into(),
        }
    }

    /// Request URL under which the response tier stores this key
    pub fn request_url(&self) -> String {
        format!("/{}/{}", self.namespace, url_encode_cache_key(&self.key))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "namespace:encoded_key"
        write!(f, "{}:{}", self.namespace, url_encode_cache_key(&self.key))
    }
}

/// URL-encode a cache key, preserving slashes but encoding other special characters
fn url_encode_cache_key(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// URL-decode a cache key
fn url_decode_cache_key(s: &str) -> Result<String, String> {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s
                .get(i + 1..i + 3)
                .ok_or_else(|| "Invalid URL encoding: incomplete escape sequence".to_string())?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| format!("Invalid URL encoding: invalid hex sequence %{}", hex))?;
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).map_err(|e| format!("Invalid URL encoding: {}", e))
}

impl std::str::FromStr for CacheKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, encoded_key) = s
            .split_once(':')
            .ok_or_else(|| "Invalid cache key format: missing ':' separator".to_string())?;

        if encoded_key.is_empty() {
            return Err("Invalid cache key format: key cannot be empty".to_string());
        }

        Ok(CacheKey {
            namespace: namespace.parse()?,
            key: url_decode_cache_key(encoded_key)?,
        })
    }
}

/// Cache entry holding a serialized payload
///
/// Each tier owns its own copy; entries are never shared between tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// JSON-encoded payload
    pub payload: Bytes,
    /// Wall-clock write time in milliseconds since UNIX epoch
    pub stored_at_ms: u64,
    /// Time-to-live; zero means the entry never expires
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create a new entry stamped with the current wall-clock time
    pub fn new(payload: Bytes, ttl: Duration) -> Self {
        Self::with_stored_at(payload, now_ms(), ttl)
    }

    pub fn with_stored_at(payload: Bytes, stored_at_ms: u64, ttl: Duration) -> Self {
        Self {
            payload,
            stored_at_ms,
            ttl,
        }
    }

    /// Milliseconds elapsed since the entry was written
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.stored_at_ms)
    }

    /// Check if this entry has expired at the given wall-clock time
    ///
    /// An entry is valid while `now - stored_at <= ttl`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        self.age_ms(now) > self.ttl.as_millis() as u64
    }

    /// Check if this entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Remaining lifetime, `None` for entries that never expire
    pub fn remaining_ttl(&self, now: u64) -> Option<Duration> {
        if self.ttl.is_zero() {
            return None;
        }
        let remaining = (self.ttl.as_millis() as u64).saturating_sub(self.age_ms(now));
        Some(Duration::from_millis(remaining))
    }

    /// Approximate size of this entry in bytes
    pub fn size_bytes(&self) -> usize {
        self.payload.len() + std::mem::size_of::<Self>()
    }
}
