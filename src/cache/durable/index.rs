//! In-memory index of the durable tier
//!
//! Mirrors the metadata files on disk. Besides the key lookup it keeps a
//! secondary index ordered by write time, so sweeps can walk a time range
//! instead of scanning every entry.

use super::backend::DiskBackend;
use super::error::DurableError;
use super::types::EntryMetadata;
use super::utils::partition_dir;
use crate::cache::{CacheKey, Namespace};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

#[derive(Default)]
struct IndexState {
    entries: HashMap<CacheKey, EntryMetadata>,
    by_write_time: BTreeSet<(u64, CacheKey)>,
    total_size: u64,
}

/// Thread-safe index of durable entries
#[derive(Default)]
pub struct DurableIndex {
    state: RwLock<IndexState>,
}

impl DurableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn insert(&self, metadata: EntryMetadata) {
        let mut state = self.state.write();
        let key = metadata.cache_key.clone();
        if let Some(old) = state.entries.remove(&key) {
            state.by_write_time.remove(&(old.stored_at_ms, key.clone()));
            state.total_size -= old.size_bytes;
        }
        state.total_size += metadata.size_bytes;
        state
            .by_write_time
            .insert((metadata.stored_at_ms, key.clone()));
        state.entries.insert(key, metadata);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<EntryMetadata> {
        let mut state = self.state.write();
        let removed = state.entries.remove(key)?;
        state
            .by_write_time
            .remove(&(removed.stored_at_ms, key.clone()));
        state.total_size -= removed.size_bytes;
        Some(removed)
    }

    pub fn entry_count(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn total_size(&self) -> u64 {
        self.state.read().total_size
    }

    pub fn clear(&self) {
        *self.state.write() = IndexState::default();
    }

    /// All keys belonging to a namespace
    pub fn keys_for_namespace(&self, namespace: Namespace) -> Vec<CacheKey> {
        self.state
            .read()
            .entries
            .keys()
            .filter(|k| k.namespace == namespace)
            .cloned()
            .collect()
    }

    /// Keys written strictly before `cutoff_ms`, oldest first
    pub fn keys_written_before(&self, cutoff_ms: u64) -> Vec<CacheKey> {
        self.state
            .read()
            .by_write_time
            .iter()
            .take_while(|(stored_at, _)| *stored_at < cutoff_ms)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Every key that is expired at `now`, by entry TTL or tier max age
    pub fn expired_keys(&self, now: u64, max_age: Duration) -> Vec<CacheKey> {
        let mut keys = if max_age.is_zero() {
            Vec::new()
        } else {
            self.keys_written_before(now.saturating_sub(max_age.as_millis() as u64))
        };

        let state = self.state.read();
        keys.extend(
            state
                .entries
                .values()
                .filter(|m| m.ttl_ms > 0 && now.saturating_sub(m.stored_at_ms) > m.ttl_ms)
                .map(|m| m.cache_key.clone()),
        );
        keys.sort();
        keys.dedup();
        keys
    }

    /// Rebuild the index from metadata files on disk
    ///
    /// Metadata that cannot be parsed, or whose data file is missing, is
    /// deleted along with its data file. Leftover temp files are removed.
    pub async fn rebuild<B: DiskBackend + ?Sized>(
        root: &Path,
        backend: &B,
    ) -> Result<Self, DurableError> {
        let index = Self::new();

        for namespace in Namespace::ALL {
            let dir = partition_dir(root, namespace);
            let files = match backend.read_dir(&dir).await {
                Ok(files) => files,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };

            let present: std::collections::HashSet<_> = files.iter().cloned().collect();

            for path in &files {
                match path.extension().and_then(|e| e.to_str()) {
                    Some("meta") => {
                        let data_path = path.with_extension("data");
                        let parsed = match backend.read_file(path).await {
                            Ok(raw) => serde_json::from_slice::<EntryMetadata>(&raw).ok(),
                            Err(_) => None,
                        };
                        match parsed {
                            Some(meta)
                                if present.contains(&data_path)
                                    && meta.cache_key.namespace == namespace =>
                            {
                                index.insert(meta);
                            }
                            _ => {
                                tracing::warn!(
                                    path = %path.display(),
                                    "Dropping unreadable durable cache entry"
                                );
                                backend.delete_file(path).await?;
                                backend.delete_file(&data_path).await?;
                            }
                        }
                    }
                    Some("data") => {
                        if !present.contains(&path.with_extension("meta")) {
                            backend.delete_file(path).await?;
                        }
                    }
                    Some("tmp") => backend.delete_file(path).await?,
                    _ => {}
                }
            }
        }

        Ok(index)
    }
}
