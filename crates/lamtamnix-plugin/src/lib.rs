//! # lamtamnix-plugin
//!
//! Plugin loading for the Lamtamnix host. Provides:
//!
//! - [`Loader`]: one load cycle (discovery in a transient context, then one
//!   isolation context per discovered plugin type)
//! - [`PluginContainer`]: owns the loaded plugins and their contexts until
//!   disposal
//! - [`ContainerObserver`]: periodic usage polling that only runs while
//!   someone is subscribed
//! - Discovery sources: [`RegistryDiscovery`], [`ManifestDiscovery`] and,
//!   with the `dynamic` feature, `DirectoryDiscovery`
//! - [`export_plugins!`] for plugin libraries

pub mod container;
pub mod discovery;
pub mod loader;
pub mod macros;
pub mod monitor;
pub mod observer;
pub mod prelude;

pub use container::{DisposeReport, PluginContainer};
#[cfg(feature = "dynamic")]
pub use discovery::DirectoryDiscovery;
pub use discovery::{
    ManifestDiscovery, PLUGIN_ABI_VERSION, PluginRegistrar, REGISTER_SYMBOL, RegistryDiscovery,
};
pub use loader::Loader;
pub use monitor::{ResourceMonitor, ResourcesUsage};
pub use observer::{ContainerObserver, UsageEvent, UsageListener};
