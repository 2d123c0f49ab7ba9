//! Host seams of the update controller
//!
//! `WorkerPlatform` wraps the worker registration API of the host, and
//! `PageHost` is the page the controller drives (prompt, loading overlay,
//! reload). Both are injected, so the controller runs unchanged against a
//! browser binding or a test fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::UpdateError;
use super::marker::VersionMarker;
use super::state::RegistrationState;

/// Message posted from the page to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Take control of open pages now instead of waiting for them to close
    SkipWaiting,
}

/// Content of the user-facing update prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePrompt {
    /// Version being offered, when the worker has reported one
    pub version: Option<VersionMarker>,
}

/// Worker registration API of the host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Register `script_url` at `scope` and report the workers already known
    async fn register(&self, script_url: &str, scope: &str)
        -> Result<RegistrationState, UpdateError>;

    /// Ask the host to fetch the script again and compare it byte-for-byte
    async fn update(&self) -> Result<(), UpdateError>;

    /// Whether a worker currently controls this page
    async fn has_controller(&self) -> bool;

    async fn post_message(&self, worker_id: &str, message: WorkerMessage)
        -> Result<(), UpdateError>;
}

/// User-facing side of the page
#[cfg_attr(test, mockall::automock)]
pub trait PageHost: Send + Sync {
    /// Render the full-screen "new version available" prompt
    fn show_update_prompt(&self, prompt: &UpdatePrompt);

    fn show_loading(&self);

    fn hide_loading(&self);

    /// Render a dismissible error affordance
    fn show_apply_error(&self, message: &str);

    /// Passive "ready for offline use" signal after a first install
    fn set_offline_ready(&self);

    fn reload(&self);
}
