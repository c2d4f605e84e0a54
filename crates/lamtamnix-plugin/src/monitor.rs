//! On-demand usage queries over the contexts of one container.

use std::collections::HashMap;
use std::sync::Arc;

use lamtamnix_core::{AppError, AppResult, ContextId, IsolationHost, PluginHandle, ResourceUsageSnapshot};

/// Usage snapshot per plugin handle.
pub type ResourcesUsage = HashMap<PluginHandle, ResourceUsageSnapshot>;

/// Queries per-context usage snapshots through the isolation host.
#[derive(Debug, Clone)]
pub struct ResourceMonitor {
    host: Arc<dyn IsolationHost>,
}

impl ResourceMonitor {
    /// Create a monitor over `host`.
    pub fn new(host: Arc<dyn IsolationHost>) -> Self {
        Self { host }
    }

    /// Snapshot one context.
    pub fn snapshot(&self, context: ContextId) -> AppResult<ResourceUsageSnapshot> {
        self.host.query_usage(context)
    }

    /// Snapshot every `(handle, context)` pair. The first failing query
    /// fails the whole collection.
    ///
    /// Fails with `MonitoringDisabled` even when there is nothing to query.
    pub fn collect<I>(&self, pairs: I) -> AppResult<ResourcesUsage>
    where
        I: IntoIterator<Item = (PluginHandle, ContextId)>,
    {
        if !self.host.monitoring_enabled() {
            return Err(AppError::monitoring_disabled());
        }
        pairs
            .into_iter()
            .map(|(handle, context)| Ok((handle, self.snapshot(context)?)))
            .collect()
    }
}
