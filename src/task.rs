//! Periodic background tasks with cooperative shutdown

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle of a task that runs a job on a fixed interval
///
/// Dropping the handle stops the task after its current tick.
pub struct IntervalTask {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl IntervalTask {
    /// Run `job` every `interval`; the first run happens immediately
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    _ = &mut shutdown_rx => {
                        tracing::debug!(task = name, "Background task shutting down");
                        break;
                    }
                }
            }
        });

        tracing::info!(
            task = name,
            interval_secs = interval.as_secs(),
            "Started background task"
        );

        Self {
            name,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the task to stop and wait until it has
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for IntervalTask {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
