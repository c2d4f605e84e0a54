//! The isolation boundary contract.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::DiscoveryConfig;
use crate::error::TeardownFault;
use crate::result::AppResult;
use crate::traits::discovery::TypeDiscovery;
use crate::types::descriptor::PluginTypeDescriptor;
use crate::types::id::{ContextId, PluginHandle};
use crate::types::usage::ResourceUsageSnapshot;

/// Creates, runs code in, measures, and destroys isolation contexts.
///
/// A context hosts at most one plugin instance for its whole lifetime.
pub trait IsolationHost: Send + Sync + fmt::Debug {
    /// Allocate a new context. `name` is a hint; the host makes the final
    /// friendly name collision-free.
    fn create_context(&self, name: &str) -> AppResult<ContextId>;

    /// Friendly name of a live context.
    fn context_name(&self, id: ContextId) -> AppResult<String>;

    /// Construct one instance of `descriptor` inside the context.
    ///
    /// Fails with `Instantiation` if the type cannot be constructed or the
    /// context already hosts a plugin, and `UnknownContext` if the id is stale.
    fn instantiate_in(&self, id: ContextId, descriptor: &PluginTypeDescriptor) -> AppResult<PluginHandle>;

    /// Run a discovery pass inside the context.
    fn discover_in(
        &self,
        id: ContextId,
        discovery: Arc<dyn TypeDiscovery>,
        config: &DiscoveryConfig,
    ) -> AppResult<Vec<PluginTypeDescriptor>>;

    /// Forward a call to the plugin hosted by the context.
    fn invoke(&self, id: ContextId, method: &str, args: Value) -> AppResult<Value>;

    /// Tear the context down and release its resources.
    ///
    /// Never panics. Faults are returned for the caller to record; the
    /// context is gone afterwards either way.
    fn destroy_context(&self, id: ContextId) -> Result<(), TeardownFault>;

    /// Snapshot the context's resource counters.
    ///
    /// Fails with `MonitoringDisabled` before monitoring is switched on and
    /// `UnknownContext` for a destroyed or unknown context.
    fn query_usage(&self, id: ContextId) -> AppResult<ResourceUsageSnapshot>;

    /// Whether usage queries are currently allowed.
    fn monitoring_enabled(&self) -> bool;

    /// Number of contexts currently alive.
    fn live_contexts(&self) -> usize;
}
