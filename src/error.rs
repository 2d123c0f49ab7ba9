// Error types module

use thiserror::Error;

use crate::cache::{CacheError, DurableError};
use crate::config::ConfigError;
use crate::update::UpdateError;

/// Crate-level error
///
/// Each subsystem keeps its own error type; this one only aggregates them
/// for callers that drive several subsystems at once.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Durable(#[from] DurableError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert() {
        let err: Error = UpdateError::NoPendingUpdate.into();
        assert!(matches!(err, Error::Update(_)));
        assert_eq!(err.to_string(), "No pending update to apply");

        let err: Error = ConfigError::MissingEnv("HOME_DIR".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
    }
}
