//! Mock disk backend for testing (in-memory HashMap storage)

use super::backend::DiskBackend;
use super::error::DurableError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mock backend that stores files in memory for testing
#[derive(Clone, Default)]
pub struct MockDiskBackend {
    files: Arc<RwLock<HashMap<PathBuf, Bytes>>>,
    /// Fail every operation with a permission error while set
    fail_all: Arc<AtomicBool>,
    simulate_storage_full: Arc<AtomicBool>,
}

impl MockDiskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    pub fn set_storage_full(&self, enabled: bool) {
        self.simulate_storage_full.store(enabled, Ordering::SeqCst);
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    pub fn put_raw(&self, path: PathBuf, data: Bytes) {
        self.files.write().insert(path, data);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn check(&self) -> Result<(), DurableError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DurableError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Simulated permission denied",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DiskBackend for MockDiskBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, DurableError> {
        self.check()?;
        self.files.read().get(path).cloned().ok_or_else(|| {
            DurableError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "File not found",
            ))
        })
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DurableError> {
        self.check()?;
        if self.simulate_storage_full.load(Ordering::SeqCst) {
            return Err(DurableError::StorageFull);
        }
        self.files.write().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DurableError> {
        self.check()?;
        self.files.write().remove(path);
        Ok(())
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<(), DurableError> {
        self.check()
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), DurableError> {
        self.check()?;
        self.files.write().retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DurableError> {
        self.check()?;
        let files: Vec<PathBuf> = self
            .files
            .read()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        if files.is_empty() {
            return Err(DurableError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Directory not found",
            )));
        }
        Ok(files)
    }
}
