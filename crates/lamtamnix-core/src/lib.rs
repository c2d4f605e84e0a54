//! # lamtamnix-core
//!
//! Core crate for the Lamtamnix plugin host. Contains the collaborator
//! traits (plugins, type discovery, isolation hosts), configuration schemas,
//! typed identifiers, resource-usage data types, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other Lamtamnix crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind, TeardownFault, TeardownFaultReason};
pub use config::AppConfig;
pub use result::AppResult;
pub use traits::discovery::TypeDiscovery;
pub use traits::isolation::IsolationHost;
pub use traits::plugin::{PLUGIN_CAPABILITY, Plugin, PluginFactory};
pub use types::descriptor::{DescriptorOrigin, PluginKind, PluginTypeDescriptor};
pub use types::id::{ContextId, PluginHandle, SubscriptionId};
pub use types::usage::ResourceUsageSnapshot;
