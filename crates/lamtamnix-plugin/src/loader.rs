//! One load cycle: discover, isolate, instantiate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{AppError, AppResult, ContextId, IsolationHost, PluginTypeDescriptor, TypeDiscovery};

use crate::container::{self, PluginContainer, PluginEntry};

/// Orchestrates load cycles against one isolation host.
#[derive(Debug, Clone)]
pub struct Loader {
    host: Arc<dyn IsolationHost>,
}

impl Loader {
    /// Create a loader over `host`.
    pub fn new(host: Arc<dyn IsolationHost>) -> Self {
        Self { host }
    }

    /// The isolation host plugins are loaded into.
    pub fn host(&self) -> &Arc<dyn IsolationHost> {
        &self.host
    }

    /// Discover plugin types and instantiate each one in its own context.
    ///
    /// Discovery runs in a transient context that is destroyed whatever the
    /// outcome. Descriptors that are abstract or do not declare
    /// `config.capability` are skipped. Instantiation is sequential; the
    /// first failure aborts the load, tears down every context created so
    /// far and returns the error. No partial container is ever returned.
    pub fn load(&self, discovery: Arc<dyn TypeDiscovery>, config: &DiscoveryConfig) -> AppResult<PluginContainer> {
        let descriptors = self.discover(discovery, config)?;

        let total = descriptors.len();
        let candidates: Vec<PluginTypeDescriptor> = descriptors
            .into_iter()
            .filter(|descriptor| {
                let keep = descriptor.is_instantiable_as(&config.capability);
                if !keep {
                    debug!(plugin = %descriptor.type_name(), kind = ?descriptor.kind(), "Skipping non-instantiable type");
                }
                keep
            })
            .collect();

        debug!(discovered = total, candidates = candidates.len(), "Discovery finished");

        let mut entries: Vec<PluginEntry> = Vec::with_capacity(candidates.len());
        for descriptor in &candidates {
            match self.instantiate(descriptor) {
                Ok(entry) => entries.push(entry),
                Err((err, orphan)) => {
                    let created = entries.iter().map(|entry| entry.context).chain(orphan);
                    let report = container::teardown(self.host.as_ref(), created);
                    warn!(
                        plugin = %descriptor.type_name(),
                        error = %err,
                        rolled_back = report.destroyed.len() + report.faults.len(),
                        "Plugin load aborted"
                    );
                    return Err(err);
                }
            }
        }

        info!(plugins = entries.len(), "Plugins loaded");
        Ok(PluginContainer::new(Arc::clone(&self.host), entries))
    }

    /// [`load`](Self::load) on the blocking pool.
    ///
    /// The cycle runs exactly as the synchronous one; the container only
    /// becomes visible once the whole load has finished.
    pub async fn load_async(
        &self,
        discovery: Arc<dyn TypeDiscovery>,
        config: DiscoveryConfig,
    ) -> AppResult<PluginContainer> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.load(discovery, &config))
            .await
            .map_err(|e| AppError::internal(format!("load task failed: {e}")))?
    }

    fn discover(&self, discovery: Arc<dyn TypeDiscovery>, config: &DiscoveryConfig) -> AppResult<Vec<PluginTypeDescriptor>> {
        let transient = self.host.create_context("discovery")?;
        let result = self.host.discover_in(transient, discovery, config);

        if let Err(fault) = self.host.destroy_context(transient) {
            warn!(context_id = %transient, reason = %fault.reason, "Discovery context teardown faulted");
        }
        result
    }

    /// Create a context for `descriptor` and construct it there. On failure
    /// the error comes back with the context that must be rolled back.
    fn instantiate(&self, descriptor: &PluginTypeDescriptor) -> Result<PluginEntry, (AppError, Option<ContextId>)> {
        let context = self
            .host
            .create_context(&context_hint(descriptor.type_name()))
            .map_err(|e| (e, None))?;

        let handle = self
            .host
            .instantiate_in(context, descriptor)
            .map_err(|e| (e, Some(context)))?;

        Ok(PluginEntry {
            handle,
            context,
            type_name: descriptor.type_name().to_string(),
        })
    }
}

/// `my_crate::plugins::EchoPlugin` -> `echoplugin`.
fn context_hint(type_name: &str) -> String {
    type_name
        .rsplit("::")
        .next()
        .unwrap_or(type_name)
        .to_ascii_lowercase()
}
