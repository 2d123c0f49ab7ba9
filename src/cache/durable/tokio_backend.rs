//! Durable tier storage on `tokio::fs`

use super::backend::DiskBackend;
use super::error::DurableError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Treat an already-missing path as removed
fn ignore_missing(result: io::Result<()>) -> Result<(), DurableError> {
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFsBackend;

impl TokioFsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Sibling temp path, unique per write so concurrent writers never share one
    fn staging_path(path: &Path) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", seq));
        path.with_file_name(name)
    }
}

#[async_trait]
impl DiskBackend for TokioFsBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, DurableError> {
        Ok(tokio::fs::read(path).await.map(Bytes::from)?)
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DurableError> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let staging = Self::staging_path(path);
        if let Err(e) = tokio::fs::write(&staging, &data).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DurableError> {
        ignore_missing(tokio::fs::remove_file(path).await)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DurableError> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), DurableError> {
        ignore_missing(tokio::fs::remove_dir_all(path).await)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DurableError> {
        let mut listing = tokio::fs::read_dir(path).await?;
        let mut paths = Vec::new();
        while let Some(dir_entry) = listing.next_entry().await? {
            paths.push(dir_entry.path());
        }
        Ok(paths)
    }
}
