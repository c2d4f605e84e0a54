//! # plugin-sample
//!
//! Sample plugins for the Lamtamnix host. Linked into the host binary as a
//! library and also built as a `cdylib` for directory discovery.

mod echo;
mod memory;

pub use echo::EchoPlugin;
pub use memory::MemoryPlugin;

use lamtamnix_plugin::prelude::*;

/// Type name of the abstract base that both sample plugins extend.
pub const BASE_TYPE: &str = "plugin_sample::BasePlugin";

/// Register every sample type, including the abstract base the loader skips.
pub fn register(registrar: &mut PluginRegistrar) {
    registrar
        .register(PluginTypeDescriptor::abstract_type(BASE_TYPE, PLUGIN_CAPABILITY))
        .register(plugin_type!(EchoPlugin))
        .register(plugin_type!(MemoryPlugin));
}

/// The sample descriptors as a list.
pub fn descriptors() -> Vec<PluginTypeDescriptor> {
    let mut registrar = PluginRegistrar::new();
    register(&mut registrar);
    registrar.into_descriptors()
}

export_plugins!(register);
