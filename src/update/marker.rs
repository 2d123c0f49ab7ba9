//! Persisted announcement record
//!
//! The last version marker seen and the worker the user was last prompted
//! about are kept in storage that survives reloads, so a later page load
//! does not announce the same update again.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::UpdateError;

/// Opaque identifier of one worker cache generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMarker(String);

impl VersionMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionMarker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What the previous page loads already announced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncedUpdate {
    /// Last version marker reported by a worker
    #[serde(default)]
    pub version: Option<VersionMarker>,
    /// Pending worker the user was prompted about
    #[serde(default)]
    pub worker_id: Option<String>,
}

impl AnnouncedUpdate {
    pub fn version(marker: VersionMarker) -> Self {
        Self {
            version: Some(marker),
            worker_id: None,
        }
    }

    pub fn was_prompted_for(&self, worker_id: &str) -> bool {
        self.worker_id.as_deref() == Some(worker_id)
    }
}

/// Storage of the announcement record; a missing record loads as default
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn load(&self) -> Result<AnnouncedUpdate, UpdateError>;

    async fn store(&self, record: &AnnouncedUpdate) -> Result<(), UpdateError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    #[serde(flatten)]
    record: AnnouncedUpdate,
    stored_at_ms: u64,
}

/// JSON file holding the marker, replaced atomically on every store
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn load(&self) -> Result<AnnouncedUpdate, UpdateError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AnnouncedUpdate::default())
            }
            Err(e) => return Err(e.into()),
        };
        let file: MarkerFile = serde_json::from_slice(&raw)?;
        Ok(file.record)
    }

    async fn store(&self, record: &AnnouncedUpdate) -> Result<(), UpdateError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = MarkerFile {
            record: record.clone(),
            stored_at_ms: crate::cache::now_ms(),
        };
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&file)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Process-local marker store
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    record: Mutex<AnnouncedUpdate>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn load(&self) -> Result<AnnouncedUpdate, UpdateError> {
        Ok(self.record.lock().clone())
    }

    async fn store(&self, record: &AnnouncedUpdate) -> Result<(), UpdateError> {
        *self.record.lock() = record.clone();
        Ok(())
    }
}
