//! Core data types shared by the host crates.

pub mod descriptor;
pub mod id;
pub mod usage;

pub use descriptor::{DescriptorOrigin, PluginKind, PluginTypeDescriptor};
pub use id::{ContextId, PluginHandle, SubscriptionId};
pub use usage::ResourceUsageSnapshot;
