//! In-process type registry.

use parking_lot::RwLock;
use tracing::{info, warn};

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{AppResult, PluginTypeDescriptor, TypeDiscovery};

use super::PluginRegistrar;

/// Discovery over explicitly registered plugin types.
#[derive(Debug, Default)]
pub struct RegistryDiscovery {
    descriptors: RwLock<Vec<PluginTypeDescriptor>>,
}

impl RegistryDiscovery {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry filled by a plugin crate's registration function.
    pub fn from_registrar(register: impl FnOnce(&mut PluginRegistrar)) -> Self {
        let mut registrar = PluginRegistrar::new();
        register(&mut registrar);
        let registry = Self::new();
        for descriptor in registrar.into_descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    /// Register a type. A later registration with the same type name
    /// replaces the earlier one.
    pub fn register(&self, descriptor: PluginTypeDescriptor) {
        let mut descriptors = self.descriptors.write();
        if let Some(existing) = descriptors
            .iter_mut()
            .find(|d| d.type_name() == descriptor.type_name())
        {
            warn!(plugin = %descriptor.type_name(), "Plugin type registered twice, replacing");
            *existing = descriptor;
            return;
        }
        info!(plugin = %descriptor.type_name(), kind = ?descriptor.kind(), "Plugin type registered");
        descriptors.push(descriptor);
    }

    /// Remove a type. Returns `true` if it was registered.
    pub fn unregister(&self, type_name: &str) -> bool {
        let mut descriptors = self.descriptors.write();
        let before = descriptors.len();
        descriptors.retain(|d| d.type_name() != type_name);
        descriptors.len() != before
    }

    /// Look a type up by name.
    pub fn resolve(&self, type_name: &str) -> Option<PluginTypeDescriptor> {
        self.descriptors
            .read()
            .iter()
            .find(|d| d.type_name() == type_name)
            .cloned()
    }

    /// Registered type names in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.descriptors
            .read()
            .iter()
            .map(|d| d.type_name().to_string())
            .collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

impl TypeDiscovery for RegistryDiscovery {
    fn discover(&self, _config: &DiscoveryConfig) -> AppResult<Vec<PluginTypeDescriptor>> {
        Ok(self.descriptors.read().clone())
    }
}
