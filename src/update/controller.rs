//! Update lifecycle controller
//!
//! Turns worker lifecycle signals into `UpdateEvent`s and drives the page
//! through `PageHost`. Only one apply sequence runs at a time, and an
//! update is announced at most once per process, once per version marker
//! and once per pending worker across page loads.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::channel::{BroadcastMessage, BroadcastPayload, ChannelPublisher, ChannelSubscription};
use super::config::UpdateConfig;
use super::error::UpdateError;
use super::marker::{AnnouncedUpdate, MarkerStore, VersionMarker};
use super::platform::{PageHost, UpdatePrompt, WorkerMessage, WorkerPlatform};
use super::state::{transition, RegistrationState, UpdateEvent, UpdateState, WorkerHandle, WorkerState};
use crate::task::IntervalTask;

/// Where an update announcement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Detected by this page's own registration
    Local,
    /// Announced by another page on the broadcast channel
    Remote,
}

pub struct UpdateController {
    config: UpdateConfig,
    platform: Arc<dyn WorkerPlatform>,
    host: Arc<dyn PageHost>,
    markers: Arc<dyn MarkerStore>,
    publisher: Option<ChannelPublisher>,
    state: watch::Sender<UpdateState>,
    registration: Mutex<RegistrationState>,
    registered: AtomicBool,
    inert: AtomicBool,
    is_applying: AtomicBool,
    apply_on_installed: AtomicBool,
    reloaded: AtomicBool,
    announced: AtomicBool,
    // reported marker equals the persisted one
    suppressed: AtomicBool,
    current_marker: Mutex<Option<VersionMarker>>,
    last_check: Mutex<Option<Instant>>,
}

impl UpdateController {
    pub fn new(
        config: UpdateConfig,
        platform: Arc<dyn WorkerPlatform>,
        host: Arc<dyn PageHost>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        let (state, _) = watch::channel(UpdateState::Idle);
        Self {
            config,
            platform,
            host,
            markers,
            publisher: None,
            state,
            registration: Mutex::new(RegistrationState::default()),
            registered: AtomicBool::new(false),
            inert: AtomicBool::new(false),
            is_applying: AtomicBool::new(false),
            apply_on_installed: AtomicBool::new(false),
            reloaded: AtomicBool::new(false),
            announced: AtomicBool::new(false),
            suppressed: AtomicBool::new(false),
            current_marker: Mutex::new(None),
            last_check: Mutex::new(None),
        }
    }

    /// Announce updates and versions to other pages through `publisher`
    pub fn with_publisher(mut self, publisher: ChannelPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn state(&self) -> UpdateState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    pub fn registration(&self) -> RegistrationState {
        self.registration.lock().clone()
    }

    /// True after a failed registration; no update checks happen then
    pub fn is_inert(&self) -> bool {
        self.inert.load(Ordering::SeqCst)
    }

    pub fn is_applying(&self) -> bool {
        self.is_applying.load(Ordering::SeqCst)
    }

    fn fire(&self, event: UpdateEvent) -> Option<UpdateState> {
        let mut next_state = None;
        self.state.send_if_modified(|state| {
            let Some(next) = transition(*state, event) else {
                tracing::debug!(state = %state, event = ?event, "Ignoring update event");
                return false;
            };
            if *state != next {
                tracing::debug!(from = %state, to = %next, event = ?event, "Update state transition");
            }
            let changed = *state != next;
            *state = next;
            next_state = Some(next);
            changed
        });
        next_state
    }

    fn publish(&self, payload: BroadcastPayload) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(payload);
        }
    }

    /// Register the worker script and pick up a worker already waiting
    pub async fn register_service_worker(&self) -> Result<(), UpdateError> {
        let registration = match self
            .platform
            .register(&self.config.script_url, &self.config.scope)
            .await
        {
            Ok(registration) => registration,
            Err(e) => {
                self.inert.store(true, Ordering::SeqCst);
                tracing::error!(
                    script_url = %self.config.script_url,
                    error = %e,
                    "Worker registration failed, update checks disabled"
                );
                return Err(match e {
                    UpdateError::Registration(_) => e,
                    other => UpdateError::Registration(other.to_string()),
                });
            }
        };

        let waiting = registration.waiting.clone();
        *self.registration.lock() = registration;
        self.registered.store(true, Ordering::SeqCst);
        tracing::info!(
            script_url = %self.config.script_url,
            scope = %self.config.scope,
            "Worker registered"
        );

        if let Some(worker) = waiting {
            if self.platform.has_controller().await {
                tracing::info!(worker = %worker.id, "Found worker waiting from an earlier visit");
                self.fire(UpdateEvent::UpdateFound);
                self.fire(UpdateEvent::Installed {
                    has_controller: true,
                });
                self.announce(Origin::Local).await;
            }
        }
        Ok(())
    }

    /// Ask the platform to recheck the worker script
    ///
    /// Returns `Ok(false)` when the controller is inert, unregistered or the
    /// last check was less than the throttle interval ago.
    pub async fn check_for_updates(&self) -> Result<bool, UpdateError> {
        if self.is_inert() || !self.registered.load(Ordering::SeqCst) {
            tracing::debug!("Skipping update check, no registration");
            return Ok(false);
        }

        {
            let now = Instant::now();
            let mut last = self.last_check.lock();
            if let Some(previous) = *last {
                let elapsed = now.duration_since(previous);
                if elapsed < self.config.check_throttle() {
                    tracing::debug!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Update check throttled"
                    );
                    return Ok(false);
                }
            }
            *last = Some(now);
        }

        self.platform.update().await?;
        tracing::debug!("Update check issued");
        Ok(true)
    }

    /// The registration observed a new installing worker
    pub fn on_update_found(&self, worker: WorkerHandle) {
        tracing::info!(worker = %worker.id, "New worker installing");
        self.registration.lock().track_installing(worker);
        // a new build is never covered by an older marker
        self.suppressed.store(false, Ordering::SeqCst);
        self.fire(UpdateEvent::UpdateFound);
    }

    /// A known worker changed state
    pub async fn on_worker_state(&self, worker_id: &str, state: WorkerState) {
        let (updated, was_pending) = {
            let mut registration = self.registration.lock();
            let was_pending = registration.is_pending(worker_id);
            (registration.update_worker(worker_id, state), was_pending)
        };
        let Some(worker) = updated else {
            tracing::debug!(worker = worker_id, state = ?state, "State change of unknown worker");
            return;
        };

        match state {
            WorkerState::Installed => {
                let has_controller = self.platform.has_controller().await;
                if !has_controller {
                    tracing::info!(worker = %worker.id, "Worker installed, content available offline");
                    self.host.set_offline_ready();
                }
                self.fire(UpdateEvent::Installed { has_controller });

                if self.apply_on_installed.swap(false, Ordering::SeqCst) {
                    if let Err(e) = self.skip_waiting(&worker).await {
                        tracing::warn!(error = %e, "Deferred apply failed");
                    }
                    return;
                }
                self.announce(Origin::Local).await;
            }
            WorkerState::Redundant => {
                tracing::debug!(worker = %worker.id, "Worker became redundant");
                if self.apply_on_installed.swap(false, Ordering::SeqCst) {
                    self.fail_apply(&worker, "worker became redundant before installing");
                }
                if was_pending {
                    self.fire(UpdateEvent::PendingLost);
                }
            }
            _ => {}
        }
    }

    /// The page's controlling worker changed
    pub fn on_controller_change(&self) {
        if !self.is_applying() {
            tracing::debug!("Controller changed without a pending apply");
            return;
        }
        self.fire(UpdateEvent::ControllerChanged);
        self.reload_once();
    }

    /// The worker reported the cache generation it created
    ///
    /// Returns whether this version may still be announced.
    pub async fn on_version_marker(&self, marker: VersionMarker) -> bool {
        let eligible = self.accept_marker(marker.clone()).await;
        if eligible {
            self.publish(BroadcastPayload::Version { marker });
            self.announce(Origin::Local).await;
        }
        eligible
    }

    async fn load_announced(&self) -> AnnouncedUpdate {
        self.markers.load().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Cannot read version marker, treating as unseen");
            AnnouncedUpdate::default()
        })
    }

    async fn save_announced(&self, record: &AnnouncedUpdate) {
        if let Err(e) = self.markers.store(record).await {
            tracing::warn!(version = ?record.version, error = %e, "Cannot persist version marker");
        }
    }

    async fn accept_marker(&self, marker: VersionMarker) -> bool {
        *self.current_marker.lock() = Some(marker.clone());

        let last_seen = self.load_announced().await;
        if last_seen.version.as_ref() == Some(&marker) {
            tracing::debug!(version = %marker, "Version already announced, suppressing prompt");
            self.suppressed.store(true, Ordering::SeqCst);
            return false;
        }

        // a prompt shown earlier in this page load was for this version
        let worker_id = if self.announced.load(Ordering::SeqCst) {
            last_seen.worker_id.clone()
        } else {
            None
        };
        self.save_announced(&AnnouncedUpdate {
            version: Some(marker.clone()),
            worker_id,
        })
        .await;
        self.suppressed.store(false, Ordering::SeqCst);
        tracing::info!(version = %marker, previous = ?last_seen.version, "New worker version");
        true
    }

    /// Message from another page on the broadcast channel
    pub async fn on_broadcast(&self, message: BroadcastMessage) {
        match message.payload {
            BroadcastPayload::UpdateAvailable => {
                if self.registration.lock().pending().is_none() {
                    tracing::debug!(seq = message.seq, "Update announced elsewhere, none pending here");
                    return;
                }
                self.fire(UpdateEvent::Announced);
                self.announce(Origin::Remote).await;
            }
            BroadcastPayload::Version { marker } => {
                if self.accept_marker(marker).await {
                    self.announce(Origin::Remote).await;
                }
            }
        }
    }

    /// Page became visible or hidden
    pub async fn on_visibility_change(&self, visible: bool) -> Result<bool, UpdateError> {
        if !visible {
            return Ok(false);
        }
        self.check_for_updates().await
    }

    /// User picked "later"
    pub fn defer_update(&self) {
        if self.fire(UpdateEvent::Deferred).is_some() {
            tracing::info!("Update deferred by user");
        }
    }

    /// Show the prompt if an update is available and was not announced yet
    ///
    /// A locally detected update is checked against the persisted record so
    /// a worker left waiting by an earlier page load is not announced again;
    /// the prompt is then recorded and broadcast to other pages.
    async fn announce(&self, origin: Origin) {
        if self.state() != UpdateState::UpdateAvailable {
            return;
        }
        if self.suppressed.load(Ordering::SeqCst) {
            tracing::debug!("Update prompt suppressed for an already announced version");
            return;
        }

        if self.announced.load(Ordering::SeqCst) {
            tracing::debug!("Update already announced in this session");
            return;
        }

        let pending = self.registration.lock().pending().map(|w| w.id.clone());
        let mut record = None;
        if origin == Origin::Local {
            let last_seen = self.load_announced().await;
            if let Some(worker_id) = pending.as_deref() {
                if last_seen.was_prompted_for(worker_id) {
                    tracing::debug!(worker = worker_id, "Worker already announced by an earlier page load");
                    self.suppressed.store(true, Ordering::SeqCst);
                    return;
                }
            }
            record = Some(last_seen);
        }

        if self.announced.swap(true, Ordering::SeqCst) {
            tracing::debug!("Update already announced in this session");
            return;
        }

        let prompt = UpdatePrompt {
            version: self.current_marker.lock().clone(),
        };
        tracing::info!(version = ?prompt.version, worker = ?pending, "Update available, prompting user");
        self.host.show_update_prompt(&prompt);

        if let Some(last_seen) = record {
            self.save_announced(&AnnouncedUpdate {
                version: prompt.version.or(last_seen.version),
                worker_id: pending,
            })
            .await;
            self.publish(BroadcastPayload::UpdateAvailable);
        }
    }

    /// User accepted the update
    ///
    /// Concurrent calls collapse into the first one. With a waiting worker
    /// this returns after the grace delay; with an installing worker the
    /// handshake starts once it reports `installed`.
    pub async fn apply_update(&self) -> Result<(), UpdateError> {
        if self.is_applying.swap(true, Ordering::SeqCst) {
            tracing::debug!("Update already being applied");
            return Ok(());
        }

        let (waiting, installing) = {
            let registration = self.registration.lock();
            (registration.waiting.clone(), registration.installing.clone())
        };

        match (waiting, installing) {
            (Some(worker), _) => self.skip_waiting(&worker).await,
            (None, Some(worker)) => {
                tracing::info!(worker = %worker.id, "Update still installing, applying once installed");
                self.apply_on_installed.store(true, Ordering::SeqCst);
                self.fire(UpdateEvent::ApplyRequested);
                self.host.show_loading();
                Ok(())
            }
            (None, None) => {
                self.is_applying.store(false, Ordering::SeqCst);
                Err(UpdateError::NoPendingUpdate)
            }
        }
    }

    async fn skip_waiting(&self, worker: &WorkerHandle) -> Result<(), UpdateError> {
        self.fire(UpdateEvent::ApplyRequested);
        self.host.show_loading();

        if let Err(e) = self
            .platform
            .post_message(&worker.id, WorkerMessage::SkipWaiting)
            .await
        {
            return Err(self.fail_apply(worker, &e.to_string()));
        }

        tracing::info!(worker = %worker.id, "Sent skip-waiting to new worker");
        tokio::time::sleep(self.config.reload_grace()).await;

        // the handoff signal may never come; reload anyway
        if self.is_applying() {
            self.fire(UpdateEvent::GraceElapsed);
            self.reload_once();
        }
        Ok(())
    }

    /// Undo an apply that cannot complete and leave the update retryable
    fn fail_apply(&self, worker: &WorkerHandle, reason: &str) -> UpdateError {
        let err = UpdateError::ApplyFailed(reason.to_string());
        tracing::error!(worker = %worker.id, error = reason, "Failed to hand control to new worker");
        self.host.hide_loading();
        self.host.show_apply_error(err.user_message());
        self.fire(UpdateEvent::ApplyFailed);
        self.is_applying.store(false, Ordering::SeqCst);
        err
    }

    fn reload_once(&self) {
        if self.reloaded.swap(true, Ordering::SeqCst) {
            tracing::debug!("Reload already triggered");
            return;
        }
        tracing::info!("Reloading page to activate new worker");
        self.host.reload();
    }

    /// Check for updates every `interval` until the handle is dropped
    pub fn spawn_periodic_checks(self: &Arc<Self>, interval: Duration) -> IntervalTask {
        let controller = Arc::clone(self);
        IntervalTask::spawn("update-check", interval, move || {
            let controller = controller.clone();
            async move {
                if let Err(e) = controller.check_for_updates().await {
                    tracing::warn!(error = %e, "Periodic update check failed");
                }
            }
        })
    }

    /// Feed messages from other pages into the controller
    pub fn spawn_broadcast_listener(
        self: &Arc<Self>,
        mut subscription: ChannelSubscription,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                controller.on_broadcast(message).await;
            }
            tracing::debug!("Broadcast channel closed");
        })
    }
}
