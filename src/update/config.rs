//! Update controller configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BROADCAST_CHANNEL, DEFAULT_CHECK_THROTTLE_SECONDS, DEFAULT_MARKER_PATH,
    DEFAULT_PERIODIC_CHECK_SECONDS, DEFAULT_RELOAD_GRACE_MS, DEFAULT_WORKER_SCOPE,
    DEFAULT_WORKER_SCRIPT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Worker script to register
    #[serde(default = "default_script_url")]
    pub script_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Minimum time between two update checks
    #[serde(default = "default_check_throttle_seconds")]
    pub check_throttle_seconds: u64,
    /// Interval of the periodic check task (0 disables it)
    #[serde(default = "default_periodic_check_seconds")]
    pub periodic_check_seconds: u64,
    /// Delay between the skip-waiting message and the forced reload
    #[serde(default = "default_reload_grace_ms")]
    pub reload_grace_ms: u64,
    /// Name of the cross-tab broadcast channel
    #[serde(default = "default_broadcast_channel")]
    pub broadcast_channel: String,
    /// File holding the last announced version marker
    #[serde(default = "default_marker_path")]
    pub marker_path: PathBuf,
}

fn default_script_url() -> String {
    DEFAULT_WORKER_SCRIPT.to_string()
}

fn default_scope() -> String {
    DEFAULT_WORKER_SCOPE.to_string()
}

fn default_check_throttle_seconds() -> u64 {
    DEFAULT_CHECK_THROTTLE_SECONDS
}

fn default_periodic_check_seconds() -> u64 {
    DEFAULT_PERIODIC_CHECK_SECONDS
}

fn default_reload_grace_ms() -> u64 {
    DEFAULT_RELOAD_GRACE_MS
}

fn default_broadcast_channel() -> String {
    DEFAULT_BROADCAST_CHANNEL.to_string()
}

fn default_marker_path() -> PathBuf {
    PathBuf::from(DEFAULT_MARKER_PATH)
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            script_url: default_script_url(),
            scope: default_scope(),
            check_throttle_seconds: default_check_throttle_seconds(),
            periodic_check_seconds: default_periodic_check_seconds(),
            reload_grace_ms: default_reload_grace_ms(),
            broadcast_channel: default_broadcast_channel(),
            marker_path: default_marker_path(),
        }
    }
}

impl UpdateConfig {
    pub fn check_throttle(&self) -> Duration {
        Duration::from_secs(self.check_throttle_seconds)
    }

    pub fn reload_grace(&self) -> Duration {
        Duration::from_millis(self.reload_grace_ms)
    }

    /// `None` when periodic checks are disabled
    pub fn periodic_check_interval(&self) -> Option<Duration> {
        (self.periodic_check_seconds > 0).then(|| Duration::from_secs(self.periodic_check_seconds))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.script_url.is_empty() {
            return Err("update.script_url cannot be empty".to_string());
        }
        if !self.scope.starts_with('/') {
            return Err(format!(
                "update.scope '{}' must start with /",
                self.scope
            ));
        }
        if self.broadcast_channel.is_empty() {
            return Err("update.broadcast_channel cannot be empty".to_string());
        }
        if self.periodic_check_seconds > 0 && self.periodic_check_seconds < self.check_throttle_seconds
        {
            return Err(format!(
                "update.periodic_check_seconds ({}) is shorter than update.check_throttle_seconds ({})",
                self.periodic_check_seconds, self.check_throttle_seconds
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: UpdateConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.script_url, "/sw.js");
        assert_eq!(config.check_throttle(), Duration::from_secs(60));
        assert_eq!(config.reload_grace(), Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_period_disables_periodic_checks() {
        let config = UpdateConfig {
            periodic_check_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.periodic_check_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scope_and_short_period() {
        let bad_scope = UpdateConfig {
            scope: "app".to_string(),
            ..Default::default()
        };
        assert!(bad_scope.validate().unwrap_err().contains("scope"));

        let short = UpdateConfig {
            periodic_check_seconds: 10,
            ..Default::default()
        };
        assert!(short.validate().is_err());
    }
}
