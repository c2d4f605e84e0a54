//! Discovery sources that produce [`PluginTypeDescriptor`]s.
//!
//! Plugin types are registered explicitly instead of being found by
//! scanning: in-process through [`RegistryDiscovery`], by name through a
//! [`ManifestDiscovery`] file, or by shared libraries exporting a
//! registration function (`DirectoryDiscovery`, `dynamic` feature).

#[cfg(feature = "dynamic")]
pub mod directory;
pub mod manifest;
pub mod registry;

#[cfg(feature = "dynamic")]
pub use directory::DirectoryDiscovery;
pub use manifest::ManifestDiscovery;
pub use registry::RegistryDiscovery;

use lamtamnix_core::PluginTypeDescriptor;

/// Version of the library registration interface. A library built against a
/// different version is skipped.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Name of the registration function a plugin library exports.
pub const REGISTER_SYMBOL: &str = "lamtamnix_register_plugins";

/// Name of the static holding the library's [`PLUGIN_ABI_VERSION`].
pub const ABI_SYMBOL: &str = "LAMTAMNIX_PLUGIN_ABI";

/// Signature of the registration function generated by
/// [`export_plugins!`](crate::export_plugins).
pub type RegisterFn = fn(&mut PluginRegistrar);

/// Collects the descriptors a plugin crate registers.
#[derive(Debug, Default)]
pub struct PluginRegistrar {
    descriptors: Vec<PluginTypeDescriptor>,
}

impl PluginRegistrar {
    /// Create an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one plugin type.
    pub fn register(&mut self, descriptor: PluginTypeDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Everything registered so far.
    pub fn into_descriptors(self) -> Vec<PluginTypeDescriptor> {
        self.descriptors
    }
}
