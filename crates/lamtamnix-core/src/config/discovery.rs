//! Plugin discovery configuration.

use serde::{Deserialize, Serialize};

use crate::traits::plugin::PLUGIN_CAPABILITY;

/// Which discovery source the host binary builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Types registered in-process.
    #[default]
    Registry,
    /// A TOML manifest naming registered types.
    Manifest,
    /// Shared libraries in a directory.
    Directory,
}

/// Settings handed to a `TypeDiscovery` pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Discovery source.
    #[serde(default)]
    pub strategy: DiscoveryStrategy,
    /// Directory scanned for plugin libraries.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Path to a plugin manifest.
    #[serde(default)]
    pub manifest: Option<String>,
    /// Capability discovered types must implement.
    #[serde(default = "default_capability")]
    pub capability: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::default(),
            directory: default_directory(),
            manifest: None,
            capability: default_capability(),
        }
    }
}

fn default_directory() -> String {
    "./plugins".to_string()
}

fn default_capability() -> String {
    PLUGIN_CAPABILITY.to_string()
}
