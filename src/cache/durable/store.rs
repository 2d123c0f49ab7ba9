//! Main DurableTier implementation

use super::backend::DiskBackend;
use super::error::DurableError;
use super::index::DurableIndex;
use super::tokio_backend::TokioFsBackend;
use super::types::{EntryMetadata, SchemaMarker};
use super::utils::{generate_paths, partition_dir, VERSION_FILE};
use crate::cache::{
    now_ms, CacheEntry, CacheError, CacheKey, CacheStats, CacheStatsTracker, CacheTier,
    DurableTierConfig, Namespace,
};
use crate::constants::DURABLE_SCHEMA_VERSION;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// File-backed tier that survives restarts
///
/// Layout: `{root}/VERSION`, `{root}/{namespace}/{sha256}.data` and the
/// matching `.meta` JSON file. The metadata file is written last and acts
/// as the commit marker for an entry.
pub struct DurableTier {
    root: PathBuf,
    backend: Arc<dyn DiskBackend>,
    index: DurableIndex,
    stats: CacheStatsTracker,
    max_age: Duration,
}

impl DurableTier {
    /// Open the tier described by `config` on the local filesystem
    pub async fn open(config: &DurableTierConfig) -> Result<Self, DurableError> {
        Self::open_with_backend(&config.dir, config.max_age(), Arc::new(TokioFsBackend::new()))
            .await
    }

    /// Open the tier with an explicit filesystem backend
    pub async fn open_with_backend(
        root: &Path,
        max_age: Duration,
        backend: Arc<dyn DiskBackend>,
    ) -> Result<Self, DurableError> {
        backend.create_dir_all(root).await?;
        Self::upgrade_schema(root, backend.as_ref()).await?;
        let index = DurableIndex::rebuild(root, backend.as_ref()).await?;

        tracing::info!(
            root = %root.display(),
            entries = index.entry_count(),
            schema_version = DURABLE_SCHEMA_VERSION,
            "Durable cache tier opened"
        );

        Ok(Self {
            root: root.to_path_buf(),
            backend,
            index,
            stats: CacheStatsTracker::new(),
            max_age,
        })
    }

    /// Wipe partitions written by any other schema version
    async fn upgrade_schema(root: &Path, backend: &dyn DiskBackend) -> Result<(), DurableError> {
        let version_path = root.join(VERSION_FILE);
        let found = match backend.read_file(&version_path).await {
            Ok(raw) => serde_json::from_slice::<SchemaMarker>(&raw)
                .map(|m| m.version)
                .unwrap_or(0),
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e),
        };

        if found == DURABLE_SCHEMA_VERSION {
            return Ok(());
        }

        tracing::info!(
            found = found,
            expected = DURABLE_SCHEMA_VERSION,
            "Durable cache schema changed, recreating partitions"
        );
        for namespace in Namespace::ALL {
            backend
                .remove_dir_all(&partition_dir(root, namespace))
                .await?;
        }

        let marker = SchemaMarker {
            version: DURABLE_SCHEMA_VERSION,
        };
        backend
            .write_file_atomic(&version_path, Bytes::from(serde_json::to_vec(&marker)?))
            .await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_count(&self) -> usize {
        self.index.entry_count()
    }

    async fn remove_files(&self, key: &CacheKey) -> Result<(), DurableError> {
        let (data_path, meta_path) = generate_paths(&self.root, key);
        self.backend.delete_file(&meta_path).await?;
        self.backend.delete_file(&data_path).await
    }

    async fn remove_keys(&self, keys: &[CacheKey]) -> Result<usize, DurableError> {
        let mut removed = 0;
        for key in keys {
            if self.index.remove(key).is_some() {
                removed += 1;
            }
            self.remove_files(key).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheTier for DurableTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let Some(meta) = self.index.get(key) else {
            self.stats.record_miss();
            return Ok(None);
        };

        if meta.is_expired(now_ms(), self.max_age) {
            self.index.remove(key);
            self.remove_files(key).await?;
            self.stats.record_expired(1);
            self.stats.record_miss();
            return Ok(None);
        }

        let (data_path, _) = generate_paths(&self.root, key);
        let payload = match self.backend.read_file(&data_path).await {
            Ok(payload) => payload,
            Err(e) if e.is_not_found() => {
                tracing::warn!(key = %key, "Durable cache data file vanished, dropping entry");
                self.index.remove(key);
                self.stats.record_miss();
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.stats.record_hit();
        Ok(Some(CacheEntry::with_stored_at(
            payload,
            meta.stored_at_ms,
            meta.ttl(),
        )))
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let (data_path, meta_path) = generate_paths(&self.root, &key);
        let metadata = EntryMetadata::for_entry(key, &entry);
        let meta_json = Bytes::from(serde_json::to_vec(&metadata)?);

        self.backend
            .write_file_atomic(&data_path, entry.payload)
            .await?;
        self.backend.write_file_atomic(&meta_path, meta_json).await?;
        self.index.insert(metadata);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let existed = self.index.remove(key).is_some();
        self.remove_files(key).await?;
        Ok(existed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.index.clear();
        for namespace in Namespace::ALL {
            let dir = partition_dir(&self.root, namespace);
            self.backend.remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn clear_namespace(&self, namespace: Namespace) -> Result<usize, CacheError> {
        let keys = self.index.keys_for_namespace(namespace);
        for key in &keys {
            self.index.remove(key);
        }
        self.backend
            .remove_dir_all(&partition_dir(&self.root, namespace))
            .await?;
        Ok(keys.len())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let expired = self.index.expired_keys(now_ms(), self.max_age);
        let removed = self.remove_keys(&expired).await?;
        self.stats.record_expired(removed as u64);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self
            .stats
            .snapshot(self.index.entry_count() as u64, self.index.total_size()))
    }
}
