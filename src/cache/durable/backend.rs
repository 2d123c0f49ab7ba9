//! Backend trait for filesystem operations

use super::error::DurableError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Abstraction over filesystem operations so the tier can be tested
/// without touching disk
#[async_trait]
pub trait DiskBackend: Send + Sync {
    /// Read entire file contents
    async fn read_file(&self, path: &Path) -> Result<Bytes, DurableError>;

    /// Write file contents atomically (using temp file + rename)
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), DurableError>;

    /// Delete a file; deleting a missing file is not an error
    async fn delete_file(&self, path: &Path) -> Result<(), DurableError>;

    /// Create directory and all parent directories
    async fn create_dir_all(&self, path: &Path) -> Result<(), DurableError>;

    /// Remove a directory and everything below it; missing is not an error
    async fn remove_dir_all(&self, path: &Path) -> Result<(), DurableError>;

    /// List all entries of a directory
    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, DurableError>;
}
