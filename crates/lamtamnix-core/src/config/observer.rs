//! Resource observer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for container observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Milliseconds between usage snapshots.
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
}

impl ObserverConfig {
    /// The update interval as a `Duration`.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval(),
        }
    }
}

fn default_update_interval() -> u64 {
    5000
}
