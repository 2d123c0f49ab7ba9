//! Update controller error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    /// The worker script could not be registered; the controller stays inert
    #[error("Worker registration failed: {0}")]
    Registration(String),

    /// A platform call (update check, messaging) failed
    #[error("Worker platform error: {0}")]
    Platform(String),

    /// `apply_update` was called with no installing or waiting worker
    #[error("No pending update to apply")]
    NoPendingUpdate,

    /// The skip-waiting handshake could not be started
    #[error("Failed to apply update: {0}")]
    ApplyFailed(String),

    /// Version marker could not be read or written
    #[error("Version marker store error: {0}")]
    MarkerStore(#[from] std::io::Error),

    #[error("Version marker is corrupt: {0}")]
    MarkerFormat(#[from] serde_json::Error),
}

impl UpdateError {
    /// Message shown to the user in the dismissible error affordance
    pub fn user_message(&self) -> &'static str {
        match self {
            UpdateError::ApplyFailed(_) | UpdateError::Platform(_) => {
                "The update could not be installed. Please try again later."
            }
            UpdateError::NoPendingUpdate => "There is no update to install.",
            _ => "Something went wrong while checking for updates.",
        }
    }
}
