//! Point-in-time resource usage of one isolation context.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::id::ContextId;

/// Immutable copy of an isolation context's resource counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsageSnapshot {
    /// The context the counters belong to.
    pub context_id: ContextId,
    /// Friendly name of the context.
    pub friendly_name: String,
    /// Bytes allocated inside the context since it was created, without
    /// subtracting memory that has since been released.
    pub total_allocated_bytes: u64,
    /// Bytes allocated inside the context that are still live.
    pub live_bytes: u64,
    /// Processor time accumulated by work executed inside the context.
    pub processor_time: Duration,
    /// Number of code modules loaded into the context.
    pub loaded_modules: u32,
}
