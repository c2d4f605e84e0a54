//! The plugin capability contract.

use std::sync::Arc;

use serde_json::Value;

/// Capability identifier every loadable plugin type must declare.
pub const PLUGIN_CAPABILITY: &str = "lamtamnix.plugin/v1";

/// Trait implemented by every hosted plugin.
///
/// A plugin is constructed, called, and dropped on the thread of the
/// isolation context that hosts it, so implementations do not need to be
/// `Send` or `Sync`.
pub trait Plugin {
    /// Human-readable plugin name.
    fn name(&self) -> &str;

    /// Called once inside the context right after construction.
    fn on_load(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Called once inside the context before the plugin is dropped.
    fn on_unload(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Handle a call forwarded across the isolation boundary.
    fn call(&mut self, method: &str, args: Value) -> Result<Value, String>;
}

/// Parameterless constructor for one plugin type.
pub type PluginFactory = Arc<dyn Fn() -> Result<Box<dyn Plugin>, String> + Send + Sync>;
