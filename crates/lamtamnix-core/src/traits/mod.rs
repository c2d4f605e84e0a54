//! Collaborator traits implemented by plugins, discovery sources, and
//! isolation hosts.

pub mod discovery;
pub mod isolation;
pub mod plugin;

pub use discovery::TypeDiscovery;
pub use isolation::IsolationHost;
pub use plugin::{PLUGIN_CAPABILITY, Plugin, PluginFactory};
