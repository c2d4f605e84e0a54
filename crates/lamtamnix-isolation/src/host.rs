//! Thread-backed implementation of [`IsolationHost`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use lamtamnix_core::config::{DiscoveryConfig, HostConfig};
use lamtamnix_core::{
    AppError, AppResult, ContextId, IsolationHost, PluginHandle, PluginTypeDescriptor,
    ResourceUsageSnapshot, TeardownFault, TypeDiscovery,
};

use crate::context::{ExecError, IsolationContext};
use crate::monitoring::MonitoringSwitch;

/// Hosts every isolation context on its own OS thread.
///
/// Isolation here is execution-context and accounting separation: plugin
/// code runs on the context thread, panics are contained there, and CPU time
/// and heap traffic on that thread are charged to the context. It is not a
/// security sandbox.
#[derive(Debug)]
pub struct ThreadIsolationHost {
    /// Live contexts by id.
    contexts: DashMap<ContextId, Arc<IsolationContext>>,
    /// Gate for usage queries.
    monitoring: MonitoringSwitch,
    /// Friendly-name prefix.
    prefix: String,
    /// Friendly-name sequence, scoped to this host.
    sequence: AtomicU64,
    instantiate_timeout: Option<Duration>,
    teardown_timeout: Option<Duration>,
}

impl ThreadIsolationHost {
    /// Create a host with default settings on the process-wide monitoring switch.
    pub fn new() -> Self {
        Self::from_config(&HostConfig::default())
    }

    /// Create a host from configuration.
    ///
    /// This does not flip the monitoring switch; the embedding binary does
    /// that once at startup.
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            contexts: DashMap::new(),
            monitoring: MonitoringSwitch::process(),
            prefix: config.context_name_prefix.clone(),
            sequence: AtomicU64::new(0),
            instantiate_timeout: config.instantiate_timeout(),
            teardown_timeout: config.teardown_timeout(),
        }
    }

    /// Use `switch` instead of the process-wide monitoring switch.
    pub fn with_monitoring(mut self, switch: MonitoringSwitch) -> Self {
        self.monitoring = switch;
        self
    }

    /// The monitoring switch this host consults.
    pub fn monitoring(&self) -> &MonitoringSwitch {
        &self.monitoring
    }

    fn context(&self, id: ContextId) -> AppResult<Arc<IsolationContext>> {
        self.contexts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::unknown_context(id))
    }

    fn next_name(&self, hint: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let hint: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!("{}-{}-{}", self.prefix, hint, seq)
    }
}

impl Default for ThreadIsolationHost {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationHost for ThreadIsolationHost {
    fn create_context(&self, name: &str) -> AppResult<ContextId> {
        let id = ContextId::new();
        let friendly_name = self.next_name(name);
        let context = IsolationContext::spawn(id, friendly_name)?;

        debug!(context_id = %id, name = %context.name(), "Isolation context created");
        self.contexts.insert(id, Arc::new(context));
        Ok(id)
    }

    fn context_name(&self, id: ContextId) -> AppResult<String> {
        Ok(self.context(id)?.name().to_string())
    }

    fn instantiate_in(&self, id: ContextId, descriptor: &PluginTypeDescriptor) -> AppResult<PluginHandle> {
        let context = self.context(id)?;
        let type_name = descriptor.type_name().to_string();

        if !context.claim() {
            return Err(AppError::instantiation(format!(
                "context '{}' already hosts a plugin; cannot construct '{type_name}'",
                context.name()
            )));
        }

        let modules = descriptor.loaded_modules();
        let descriptor = descriptor.clone();
        let result = context.execute(self.instantiate_timeout, move |state| state.install(&descriptor));

        match result {
            Ok(Ok(())) => {
                context.counters().add_loaded_modules(modules);
                let handle = PluginHandle::new();
                info!(
                    context_id = %id,
                    context = %context.name(),
                    plugin = %type_name,
                    handle = %handle,
                    "Plugin instantiated"
                );
                Ok(handle)
            }
            Ok(Err(msg)) => Err(AppError::instantiation(format!(
                "failed to construct '{type_name}' in context '{}': {msg}",
                context.name()
            ))),
            Err(ExecError::Panicked(msg)) => Err(AppError::instantiation(format!(
                "constructor of '{type_name}' panicked in context '{}': {msg}",
                context.name()
            ))),
            Err(ExecError::TimedOut) => Err(AppError::timeout(format!(
                "constructing '{type_name}' in context '{}' exceeded {:?}",
                context.name(),
                self.instantiate_timeout.unwrap_or_default()
            ))),
            Err(ExecError::Gone) => Err(AppError::unknown_context(id)),
        }
    }

    fn discover_in(
        &self,
        id: ContextId,
        discovery: Arc<dyn TypeDiscovery>,
        config: &DiscoveryConfig,
    ) -> AppResult<Vec<PluginTypeDescriptor>> {
        let context = self.context(id)?;
        let config = config.clone();

        match context.execute(None, move |_state| discovery.discover(&config)) {
            Ok(result) => result,
            Err(ExecError::Panicked(msg)) => Err(AppError::discovery(format!(
                "discovery panicked in context '{}': {msg}",
                context.name()
            ))),
            Err(ExecError::TimedOut) => Err(AppError::timeout("discovery timed out")),
            Err(ExecError::Gone) => Err(AppError::unknown_context(id)),
        }
    }

    fn invoke(&self, id: ContextId, method: &str, args: Value) -> AppResult<Value> {
        let context = self.context(id)?;
        let method = method.to_string();
        let call_name = method.clone();

        match context.execute(None, move |state| state.call(&method, args)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(msg)) => Err(AppError::invocation(format!(
                "'{call_name}' failed in context '{}': {msg}",
                context.name()
            ))),
            Err(ExecError::Panicked(msg)) => Err(AppError::invocation(format!(
                "'{call_name}' panicked in context '{}': {msg}",
                context.name()
            ))),
            Err(ExecError::TimedOut) => Err(AppError::timeout(format!("'{call_name}' timed out"))),
            Err(ExecError::Gone) => Err(AppError::unknown_context(id)),
        }
    }

    fn destroy_context(&self, id: ContextId) -> Result<(), TeardownFault> {
        let (_, context) = self
            .contexts
            .remove(&id)
            .ok_or_else(|| TeardownFault::unknown(id))?;

        let outcome = context.shutdown(self.teardown_timeout);
        match &outcome {
            Ok(()) => debug!(context_id = %id, name = %context.name(), "Isolation context destroyed"),
            Err(fault) => warn!(context_id = %id, name = %context.name(), reason = %fault.reason, "Isolation context teardown faulted"),
        }
        outcome
    }

    fn query_usage(&self, id: ContextId) -> AppResult<ResourceUsageSnapshot> {
        if !self.monitoring.is_enabled() {
            return Err(AppError::monitoring_disabled());
        }
        let context = self.context(id)?;
        Ok(context.counters().snapshot(context.id(), context.name()))
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitoring.is_enabled()
    }

    fn live_contexts(&self) -> usize {
        self.contexts.len()
    }
}

impl Drop for ThreadIsolationHost {
    fn drop(&mut self) {
        let leftover: Vec<ContextId> = self.contexts.iter().map(|entry| *entry.key()).collect();
        if leftover.is_empty() {
            return;
        }
        warn!(count = leftover.len(), "Isolation host dropped with live contexts, tearing down");
        for id in leftover {
            let _ = self.destroy_context(id);
        }
    }
}
