//! Worker update lifecycle
//!
//! Detects a newly installed worker version, asks the user before handing
//! control to it, and reloads the page exactly once after the handoff.
//! The host platform is reached only through the traits in `platform`.

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod marker;
pub mod platform;
pub mod state;

pub use channel::{
    BroadcastMessage, BroadcastPayload, ChannelPublisher, ChannelSubscription, UpdateChannel,
};
pub use config::UpdateConfig;
pub use controller::UpdateController;
pub use error::UpdateError;
pub use marker::{
    AnnouncedUpdate, FileMarkerStore, MarkerStore, MemoryMarkerStore, VersionMarker,
};
pub use platform::{PageHost, UpdatePrompt, WorkerMessage, WorkerPlatform};
pub use state::{
    transition, RegistrationState, UpdateEvent, UpdateState, WorkerHandle, WorkerState,
};
