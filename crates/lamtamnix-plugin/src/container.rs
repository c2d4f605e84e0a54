//! The container that owns one load cycle's plugins.

use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use lamtamnix_core::{AppError, AppResult, ContextId, IsolationHost, PluginHandle, TeardownFault};

use crate::monitor::{ResourceMonitor, ResourcesUsage};

/// One loaded plugin and the context that hosts it.
#[derive(Debug, Clone)]
pub(crate) struct PluginEntry {
    pub(crate) handle: PluginHandle,
    pub(crate) context: ContextId,
    pub(crate) type_name: String,
}

#[derive(Debug)]
enum ContainerState {
    Live(Vec<PluginEntry>),
    Disposed,
}

/// Outcome of [`PluginContainer::dispose`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisposeReport {
    /// Contexts that were torn down cleanly.
    pub destroyed: Vec<ContextId>,
    /// Contexts whose teardown faulted. They are gone either way.
    pub faults: Vec<TeardownFault>,
}

impl DisposeReport {
    /// `true` if no context faulted.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Owns the `(plugin handle, isolation context)` pairs produced by one load.
///
/// State machine: `Live -> Disposed`. Every operation checks the state first
/// and fails with [`lamtamnix_core::ErrorKind::Disposed`] once disposed.
/// Usage queries hold the state read lock while they run; disposal takes
/// the write lock, so it waits for in-flight queries and no query ever sees
/// a destroyed context.
pub struct PluginContainer {
    host: Arc<dyn IsolationHost>,
    monitor: ResourceMonitor,
    state: RwLock<ContainerState>,
}

impl PluginContainer {
    pub(crate) fn new(host: Arc<dyn IsolationHost>, entries: Vec<PluginEntry>) -> Self {
        Self {
            monitor: ResourceMonitor::new(Arc::clone(&host)),
            host,
            state: RwLock::new(ContainerState::Live(entries)),
        }
    }

    fn disposed_error() -> AppError {
        AppError::disposed("plugin container has been disposed")
    }

    /// Run `f` over the live entries under the read lock.
    fn with_entries<R>(&self, f: impl FnOnce(&[PluginEntry]) -> AppResult<R>) -> AppResult<R> {
        match &*self.state.read() {
            ContainerState::Live(entries) => f(entries),
            ContainerState::Disposed => Err(Self::disposed_error()),
        }
    }

    fn entry<'a>(entries: &'a [PluginEntry], handle: PluginHandle) -> AppResult<&'a PluginEntry> {
        entries
            .iter()
            .find(|entry| entry.handle == handle)
            .ok_or_else(|| AppError::invocation(format!("plugin handle {handle} is not owned by this container")))
    }

    /// Handles of every loaded plugin.
    pub fn plugins(&self) -> AppResult<Vec<PluginHandle>> {
        self.with_entries(|entries| Ok(entries.iter().map(|entry| entry.handle).collect()))
    }

    /// Number of loaded plugins.
    pub fn len(&self) -> AppResult<usize> {
        self.with_entries(|entries| Ok(entries.len()))
    }

    /// `true` if the load produced no plugins.
    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Type name the plugin behind `handle` was constructed from.
    pub fn type_name(&self, handle: PluginHandle) -> AppResult<String> {
        self.with_entries(|entries| Ok(Self::entry(entries, handle)?.type_name.clone()))
    }

    /// Context hosting the plugin behind `handle`.
    pub fn context_of(&self, handle: PluginHandle) -> AppResult<ContextId> {
        self.with_entries(|entries| Ok(Self::entry(entries, handle)?.context))
    }

    /// Call `method` on the plugin behind `handle`, inside its context.
    pub fn invoke(&self, handle: PluginHandle, method: &str, args: Value) -> AppResult<Value> {
        self.with_entries(|entries| {
            let entry = Self::entry(entries, handle)?;
            self.host.invoke(entry.context, method, args)
        })
    }

    /// Usage snapshot of every plugin's context.
    pub fn resources_usage(&self) -> AppResult<ResourcesUsage> {
        self.with_entries(|entries| {
            self.monitor
                .collect(entries.iter().map(|entry| (entry.handle, entry.context)))
        })
    }

    /// [`resources_usage`](Self::resources_usage) on the blocking pool.
    pub async fn resources_usage_async(self: Arc<Self>) -> AppResult<ResourcesUsage> {
        tokio::task::spawn_blocking(move || self.resources_usage())
            .await
            .map_err(|e| AppError::internal(format!("usage query task failed: {e}")))?
    }

    /// Tear down every context.
    ///
    /// Teardown is best-effort: a fault on one context is recorded in the
    /// report and the remaining contexts are still torn down. A second call
    /// fails with `Disposed`.
    pub fn dispose(&self) -> AppResult<DisposeReport> {
        let mut state = self.state.write();
        let entries = match mem::replace(&mut *state, ContainerState::Disposed) {
            ContainerState::Live(entries) => entries,
            ContainerState::Disposed => return Err(Self::disposed_error()),
        };

        let report = teardown(self.host.as_ref(), entries.iter().map(|entry| entry.context));
        info!(
            destroyed = report.destroyed.len(),
            faults = report.faults.len(),
            "Plugin container disposed"
        );
        Ok(report)
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        matches!(*self.state.read(), ContainerState::Disposed)
    }
}

/// Destroy every context in `contexts`, continuing past faults.
pub(crate) fn teardown(host: &dyn IsolationHost, contexts: impl IntoIterator<Item = ContextId>) -> DisposeReport {
    let mut report = DisposeReport::default();
    for context in contexts {
        match host.destroy_context(context) {
            Ok(()) => report.destroyed.push(context),
            Err(fault) => {
                warn!(
                    context_id = %fault.context_id,
                    context = %fault.context_name,
                    reason = %fault.reason,
                    "Context teardown faulted, continuing"
                );
                report.faults.push(fault);
            }
        }
    }
    report
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let mut s = f.debug_struct("PluginContainer");
        match &*state {
            ContainerState::Live(entries) => s.field("plugins", &entries.len()),
            ContainerState::Disposed => s.field("disposed", &true),
        };
        s.finish()
    }
}

impl Drop for PluginContainer {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        warn!("Plugin container dropped without dispose, tearing down");
        let _ = self.dispose();
    }
}
