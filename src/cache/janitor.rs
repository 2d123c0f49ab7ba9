//! Background sweep of expired entries

use std::sync::Arc;
use std::time::Duration;

use super::traits::CacheTier;
use crate::task::IntervalTask;

/// Running sweep of one tier; dropping it stops the sweep
pub struct JanitorHandle {
    task: IntervalTask,
}

impl JanitorHandle {
    /// Sweep `tier` every `interval`, starting immediately
    pub fn spawn(tier: Arc<dyn CacheTier>, interval: Duration) -> Self {
        let task = IntervalTask::spawn("cache-janitor", interval, move || {
            let tier = tier.clone();
            async move { sweep(tier.as_ref()).await }
        });
        Self { task }
    }

    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}

async fn sweep(tier: &dyn CacheTier) {
    match tier.purge_expired().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(
            tier = tier.name(),
            removed = removed,
            "Swept expired cache entries"
        ),
        Err(e) => tracing::warn!(tier = tier.name(), error = %e, "Cache sweep failed"),
    }
}
