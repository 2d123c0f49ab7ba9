// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps the config defaults,
// the tiers, and the update controller in agreement.

// =============================================================================
// Memory tier defaults
// =============================================================================

/// Default maximum number of entries held by the memory tier
pub const DEFAULT_MEMORY_MAX_ENTRIES: usize = 100;

// =============================================================================
// Durable tier defaults
// =============================================================================

/// Default root directory of the durable tier
pub const DEFAULT_DURABLE_DIR: &str = "/var/cache/tsubame";

/// Current on-disk schema version of the durable tier
pub const DURABLE_SCHEMA_VERSION: u32 = 2;

/// Default maximum age of any durable entry (24 hours)
pub const DEFAULT_DURABLE_MAX_AGE_SECONDS: u64 = 24 * 60 * 60;

/// Default interval between durable tier sweeps (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 300;

/// Default timeout for a single durable or response tier operation
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 2_000;

// =============================================================================
// Response tier defaults
// =============================================================================

/// Default bucket name prefix; the bucket is `{prefix}-{version}`
pub const DEFAULT_RESPONSE_CACHE_PREFIX: &str = "portal-api";

/// Default deployed version used when none is configured
pub const DEFAULT_RESPONSE_CACHE_VERSION: &str = "v1";

/// Default upper bound on entries per response bucket
pub const DEFAULT_RESPONSE_MAX_ENTRIES: u64 = 1_000;

// =============================================================================
// Namespace default TTLs
// =============================================================================

/// API responses go stale quickly (5 minutes)
pub const DEFAULT_API_TTL_SECONDS: u64 = 5 * 60;

/// Images rarely change (7 days)
pub const DEFAULT_IMAGES_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Rendered pages (1 hour)
pub const DEFAULT_PAGES_TTL_SECONDS: u64 = 60 * 60;

/// Static assets (30 days)
pub const DEFAULT_ASSETS_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

// =============================================================================
// Update controller defaults
// =============================================================================

/// Default worker script URL
pub const DEFAULT_WORKER_SCRIPT: &str = "/sw.js";

/// Default worker scope
pub const DEFAULT_WORKER_SCOPE: &str = "/";

/// Minimum wall time between two update checks
pub const DEFAULT_CHECK_THROTTLE_SECONDS: u64 = 60;

/// Default interval of the periodic update check (30 minutes)
pub const DEFAULT_PERIODIC_CHECK_SECONDS: u64 = 30 * 60;

/// Delay between the skip-waiting instruction and the forced reload
pub const DEFAULT_RELOAD_GRACE_MS: u64 = 300;

/// Default cross-tab broadcast channel name
pub const DEFAULT_BROADCAST_CHANNEL: &str = "sw-updates";

/// Capacity of the in-process broadcast channel
pub const BROADCAST_CAPACITY: usize = 16;

/// Default location of the persisted version marker
pub const DEFAULT_MARKER_PATH: &str = "/var/cache/tsubame/sw-version.json";
