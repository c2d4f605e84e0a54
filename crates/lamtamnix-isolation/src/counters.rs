//! Live resource counters of one isolation context.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use lamtamnix_core::{ContextId, ResourceUsageSnapshot};

/// Counters updated by the context thread and the accounting allocator.
///
/// All updates are relaxed atomics; a snapshot is a consistent-enough view
/// for observability, not a transactional one.
#[derive(Debug, Default)]
pub struct ResourceCounters {
    total_allocated: AtomicU64,
    /// Signed: memory allocated elsewhere may be released on the context thread.
    live: AtomicI64,
    processor_nanos: AtomicU64,
    loaded_modules: AtomicU32,
}

impl ResourceCounters {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allocation of `bytes`.
    #[inline]
    pub fn record_alloc(&self, bytes: u64) {
        self.total_allocated.fetch_add(bytes, Ordering::Relaxed);
        self.live.fetch_add(bytes as i64, Ordering::Relaxed);
    }

    /// Record a release of `bytes`.
    #[inline]
    pub fn record_dealloc(&self, bytes: u64) {
        self.live.fetch_sub(bytes as i64, Ordering::Relaxed);
    }

    /// Add processor time spent inside the context.
    pub fn record_processor_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.processor_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Count code modules loaded into the context.
    pub fn add_loaded_modules(&self, count: u32) {
        self.loaded_modules.fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the counters into an immutable snapshot.
    pub fn snapshot(&self, context_id: ContextId, friendly_name: &str) -> ResourceUsageSnapshot {
        ResourceUsageSnapshot {
            context_id,
            friendly_name: friendly_name.to_string(),
            total_allocated_bytes: self.total_allocated.load(Ordering::Relaxed),
            live_bytes: self.live.load(Ordering::Relaxed).max(0) as u64,
            processor_time: Duration::from_nanos(self.processor_nanos.load(Ordering::Relaxed)),
            loaded_modules: self.loaded_modules.load(Ordering::Relaxed),
        }
    }
}
