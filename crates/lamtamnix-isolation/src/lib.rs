//! # lamtamnix-isolation
//!
//! Isolation contexts for the Lamtamnix plugin host. Each context owns one
//! dedicated OS thread: plugins are constructed, called, and dropped on that
//! thread, so a panicking plugin cannot unwind into the host and every unit
//! of work can be attributed to the context that ran it.
//!
//! - [`ThreadIsolationHost`] implements [`lamtamnix_core::IsolationHost`].
//! - [`ResourceCounters`] hold the live counters of one context.
//! - [`MonitoringSwitch`] gates usage queries, process-wide by default.
//! - [`AccountingAllocator`] attributes heap traffic to the current context
//!   when installed as the `#[global_allocator]` of the embedding binary.

pub mod alloc;
mod context;
pub mod counters;
pub mod host;
pub mod monitoring;

pub use alloc::AccountingAllocator;
pub use counters::ResourceCounters;
pub use host::ThreadIsolationHost;
pub use monitoring::{MonitoringSwitch, enable_monitoring};
