//! Prelude for plugin crates and hosts.

pub use serde_json::{Value, json};

pub use lamtamnix_core::{
    AppError, AppResult, DescriptorOrigin, ErrorKind, PLUGIN_CAPABILITY, Plugin, PluginHandle,
    PluginKind, PluginTypeDescriptor, ResourceUsageSnapshot, TypeDiscovery,
};

pub use crate::container::{DisposeReport, PluginContainer};
pub use crate::discovery::{PluginRegistrar, RegistryDiscovery};
pub use crate::loader::Loader;
pub use crate::observer::{ContainerObserver, UsageEvent, UsageListener};

pub use crate::{export_plugins, plugin_type};
