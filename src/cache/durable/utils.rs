//! Utility functions for the durable tier

use crate::cache::{CacheKey, Namespace};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Name of the schema version file at the tier root
pub const VERSION_FILE: &str = "VERSION";

/// Convert a CacheKey to a SHA256 hash for use as a filename
pub fn key_to_hash(key: &CacheKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.namespace.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(key.key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Directory holding one namespace's partition
pub fn partition_dir(root: &Path, namespace: Namespace) -> PathBuf {
    root.join(namespace.as_str())
}

/// Generate file paths for data and metadata files
pub fn generate_paths(root: &Path, key: &CacheKey) -> (PathBuf, PathBuf) {
    let dir = partition_dir(root, key.namespace);
    let hash = key_to_hash(key);
    (
        dir.join(format!("{}.data", hash)),
        dir.join(format!("{}.meta", hash)),
    )
}
