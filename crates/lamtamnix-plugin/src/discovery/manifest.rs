//! Manifest-driven discovery.
//!
//! ```toml
//! [[plugins]]
//! type_name = "plugin_sample::EchoPlugin"
//!
//! [[plugins]]
//! type_name = "plugin_sample::MemoryPlugin"
//! enabled = false
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{AppError, AppResult, PluginTypeDescriptor, TypeDiscovery};

use super::RegistryDiscovery;

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    type_name: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Discovery over a TOML manifest of type names, resolved against a registry.
///
/// Entries that are disabled, malformed, or not registered are skipped with
/// a warning. A missing or unparsable manifest fails the pass.
#[derive(Debug, Clone)]
pub struct ManifestDiscovery {
    registry: Arc<RegistryDiscovery>,
    path: Option<PathBuf>,
}

impl ManifestDiscovery {
    /// Resolve manifest entries against `registry`. The manifest path comes
    /// from `DiscoveryConfig::manifest` unless set with [`with_path`](Self::with_path).
    pub fn new(registry: Arc<RegistryDiscovery>) -> Self {
        Self { registry, path: None }
    }

    /// Read the manifest at `path`, ignoring the configured one.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn manifest_path(&self, config: &DiscoveryConfig) -> AppResult<PathBuf> {
        self.path
            .clone()
            .or_else(|| config.manifest.as_ref().map(PathBuf::from))
            .ok_or_else(|| AppError::configuration("manifest discovery requires a manifest path"))
    }

    fn read_entries(path: &Path) -> AppResult<Vec<config::Value>> {
        let manifest = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            )
            .build()
            .map_err(|e| AppError::discovery(format!("failed to read manifest '{}': {e}", path.display())))?;

        match manifest.get_array("plugins") {
            Ok(entries) => Ok(entries),
            Err(config::ConfigError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(AppError::discovery(format!(
                "manifest '{}' has an invalid 'plugins' table: {e}",
                path.display()
            ))),
        }
    }
}

impl TypeDiscovery for ManifestDiscovery {
    fn discover(&self, config: &DiscoveryConfig) -> AppResult<Vec<PluginTypeDescriptor>> {
        let path = self.manifest_path(config)?;
        let entries = Self::read_entries(&path)?;

        let mut found = Vec::with_capacity(entries.len());
        for (index, raw) in entries.into_iter().enumerate() {
            let entry: ManifestEntry = match raw.try_deserialize() {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(manifest = %path.display(), index, error = %e, "Skipping malformed manifest entry");
                    continue;
                }
            };
            if !entry.enabled {
                debug!(plugin = %entry.type_name, "Manifest entry disabled");
                continue;
            }
            match self.registry.resolve(&entry.type_name) {
                Some(descriptor) => found.push(descriptor),
                None => warn!(
                    manifest = %path.display(),
                    plugin = %entry.type_name,
                    "Manifest names an unregistered plugin type, skipping"
                ),
            }
        }
        Ok(found)
    }
}
