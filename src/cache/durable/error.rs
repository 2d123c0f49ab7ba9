//! Error types for durable tier operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DurableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage full: cannot store entry")]
    StorageFull,

    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("Backend unavailable")]
    BackendUnavailable,
}

impl DurableError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DurableError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

// Conversion to CacheError
impl From<DurableError> for crate::cache::CacheError {
    fn from(err: DurableError) -> Self {
        match err {
            DurableError::Io(e) => crate::cache::CacheError::IoError(e),
            DurableError::Serialization(e) => {
                crate::cache::CacheError::SerializationError(e.to_string())
            }
            other => crate::cache::CacheError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheError;

    #[test]
    fn test_not_found_detection() {
        let err = DurableError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.is_not_found());
        assert!(!DurableError::StorageFull.is_not_found());
    }

    #[test]
    fn test_converts_into_cache_error() {
        let err: CacheError = DurableError::BackendUnavailable.into();
        assert!(matches!(err, CacheError::Unavailable(_)));

        let err: CacheError =
            DurableError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")).into();
        assert!(matches!(err, CacheError::IoError(_)));
    }
}
