//! Isolation host configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the isolation host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Switch process-wide resource monitoring on at startup.
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
    /// Prefix for context friendly names.
    #[serde(default = "default_prefix")]
    pub context_name_prefix: String,
    /// Upper bound, in milliseconds, on waiting for a plugin to be constructed.
    #[serde(default)]
    pub instantiate_timeout_ms: Option<u64>,
    /// Upper bound, in milliseconds, on waiting for a context to shut down.
    #[serde(default)]
    pub teardown_timeout_ms: Option<u64>,
}

impl HostConfig {
    /// Bounded wait for instantiation, if configured.
    pub fn instantiate_timeout(&self) -> Option<Duration> {
        self.instantiate_timeout_ms.map(Duration::from_millis)
    }

    /// Bounded wait for teardown, if configured.
    pub fn teardown_timeout(&self) -> Option<Duration> {
        self.teardown_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            context_name_prefix: default_prefix(),
            instantiate_timeout_ms: None,
            teardown_timeout_ms: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "lamtamnix".to_string()
}
