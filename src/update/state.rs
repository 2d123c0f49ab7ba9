//! Update lifecycle state machine
//!
//! States:
//! - **Idle**: nothing pending, or the user deferred
//! - **UpdateDetected**: a new worker is installing
//! - **UpdateAvailable**: a new worker is waiting and an older one controls the page
//! - **Applying**: skip-waiting was sent, waiting for the handoff
//! - **Reloading**: the page is reloading (terminal)
//!
//! `transition` is pure; the controller feeds it one event per signal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one page session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateState {
    #[default]
    Idle,
    UpdateDetected,
    UpdateAvailable,
    Applying,
    Reloading,
}

impl UpdateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateState::Idle => "idle",
            UpdateState::UpdateDetected => "update-detected",
            UpdateState::UpdateAvailable => "update-available",
            UpdateState::Applying => "applying",
            UpdateState::Reloading => "reloading",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Reloading)
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A new installing worker was observed
    UpdateFound,
    /// The installing worker reached `installed`
    Installed { has_controller: bool },
    /// Another tab announced an available update
    Announced,
    /// User chose "later"
    Deferred,
    /// User accepted the update
    ApplyRequested,
    /// The skip-waiting message could not be delivered
    ApplyFailed,
    /// The new worker took control of the page
    ControllerChanged,
    /// Grace delay elapsed without a handoff signal
    GraceElapsed,
    /// The pending worker became redundant
    PendingLost,
}

/// Next state for `event` in `state`, or `None` if the event is ignored
pub fn transition(state: UpdateState, event: UpdateEvent) -> Option<UpdateState> {
    use UpdateEvent::*;
    use UpdateState::*;

    match (state, event) {
        (Reloading, _) => None,

        (Idle | UpdateDetected, UpdateFound) => Some(UpdateDetected),
        (UpdateDetected, Installed { has_controller: true }) => Some(UpdateAvailable),
        // first install: the page was never controlled, nothing to announce
        (UpdateDetected, Installed { has_controller: false }) => Some(Idle),
        (Idle | UpdateDetected, Announced) => Some(UpdateAvailable),

        (UpdateAvailable, Deferred) => Some(Idle),
        (Idle | UpdateDetected | UpdateAvailable, ApplyRequested) => Some(Applying),
        (Applying, ApplyFailed) => Some(UpdateAvailable),
        (Applying, ControllerChanged | GraceElapsed) => Some(Reloading),
        (UpdateDetected | UpdateAvailable, PendingLost) => Some(Idle),

        _ => None,
    }
}

/// Lifecycle state of a single worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// One registered worker instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub id: String,
    pub script_url: String,
    pub state: WorkerState,
}

impl WorkerHandle {
    pub fn new(id: impl Into<String>, script_url: impl Into<String>, state: WorkerState) -> Self {
        Self {
            id: id.into(),
            script_url: script_url.into(),
            state,
        }
    }
}

/// Workers known to one registration
///
/// At most one active and one pending (installing or waiting) worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    pub active: Option<WorkerHandle>,
    pub installing: Option<WorkerHandle>,
    pub waiting: Option<WorkerHandle>,
}

impl RegistrationState {
    /// Record a new installing worker; it supersedes any not-yet-activated one
    pub fn track_installing(&mut self, worker: WorkerHandle) {
        self.waiting = None;
        self.installing = Some(WorkerHandle {
            state: WorkerState::Installing,
            ..worker
        });
    }

    /// Apply a state change of worker `id`; returns the updated handle if known
    pub fn update_worker(&mut self, id: &str, state: WorkerState) -> Option<WorkerHandle> {
        let is = |w: &Option<WorkerHandle>| w.as_ref().is_some_and(|w| w.id == id);

        let mut worker = if is(&self.installing) {
            self.installing.take()?
        } else if is(&self.waiting) {
            self.waiting.take()?
        } else if is(&self.active) {
            self.active.take()?
        } else {
            return None;
        };
        worker.state = state;

        match state {
            WorkerState::Installing => self.installing = Some(worker.clone()),
            WorkerState::Installed => self.waiting = Some(worker.clone()),
            WorkerState::Activating | WorkerState::Activated => {
                self.active = Some(worker.clone())
            }
            WorkerState::Redundant => {}
        }
        Some(worker)
    }

    /// Whether `id` is the installing or waiting worker
    pub fn is_pending(&self, id: &str) -> bool {
        [&self.installing, &self.waiting]
            .into_iter()
            .flatten()
            .any(|w| w.id == id)
    }

    /// Worker an update would be applied to, if any is pending
    pub fn pending(&self) -> Option<&WorkerHandle> {
        self.waiting.as_ref().or(self.installing.as_ref())
    }
}
