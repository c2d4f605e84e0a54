//! Plugin type descriptors produced by discovery and consumed by the loader.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::traits::plugin::{Plugin, PluginFactory};

/// Whether a described type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginKind {
    /// A constructible implementation.
    Concrete,
    /// A base or marker type that has no factory of its own.
    Abstract,
}

/// Where a descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorOrigin {
    /// Compiled into the host binary and registered explicitly.
    Builtin,
    /// Exported by a shared library loaded at runtime.
    Library {
        /// Path the library was loaded from.
        path: PathBuf,
    },
}

/// Identifies one candidate plugin implementation.
///
/// A descriptor is cheap to clone; its factory and any library it depends
/// on are reference counted.
#[derive(Clone)]
pub struct PluginTypeDescriptor {
    type_name: String,
    capability: String,
    kind: PluginKind,
    origin: DescriptorOrigin,
    factory: Option<PluginFactory>,
    /// Keeps a backing library mapped for as long as any plugin built from it lives.
    keep_alive: Option<Arc<dyn Any + Send + Sync>>,
}

impl PluginTypeDescriptor {
    /// Describe a concrete type constructed by `factory`.
    pub fn concrete<F>(type_name: impl Into<String>, capability: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Plugin>, String> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            capability: capability.into(),
            kind: PluginKind::Concrete,
            origin: DescriptorOrigin::Builtin,
            factory: Some(Arc::new(factory)),
            keep_alive: None,
        }
    }

    /// Describe an abstract type. The loader filters these out.
    pub fn abstract_type(type_name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            capability: capability.into(),
            kind: PluginKind::Abstract,
            origin: DescriptorOrigin::Builtin,
            factory: None,
            keep_alive: None,
        }
    }

    /// Record where this descriptor was loaded from.
    pub fn with_origin(mut self, origin: DescriptorOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Attach an object that must outlive every plugin built from this descriptor.
    pub fn with_keep_alive(mut self, owner: Arc<dyn Any + Send + Sync>) -> Self {
        self.keep_alive = Some(owner);
        self
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Capability this type claims to implement.
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Concrete or abstract.
    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Origin of the descriptor.
    pub fn origin(&self) -> &DescriptorOrigin {
        &self.origin
    }

    /// The library handle or other owner kept alive by this descriptor.
    pub fn keep_alive(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.keep_alive.as_ref()
    }

    /// Number of code modules an instance of this type brings into its context.
    pub fn loaded_modules(&self) -> u32 {
        match self.origin {
            DescriptorOrigin::Builtin => 0,
            DescriptorOrigin::Library { .. } => 1,
        }
    }

    /// `true` if this is a concrete, constructible type for `capability`.
    pub fn is_instantiable_as(&self, capability: &str) -> bool {
        self.kind == PluginKind::Concrete && self.factory.is_some() && self.capability == capability
    }

    /// Run the factory. Must be called on the thread of the hosting context.
    pub fn instantiate(&self) -> Result<Box<dyn Plugin>, String> {
        match &self.factory {
            Some(factory) if self.kind == PluginKind::Concrete => factory(),
            _ => Err(format!("type '{}' is abstract and cannot be constructed", self.type_name)),
        }
    }
}

impl fmt::Debug for PluginTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTypeDescriptor")
            .field("type_name", &self.type_name)
            .field("capability", &self.capability)
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("factory", &self.factory.as_ref().map(|_| "<factory>"))
            .finish()
    }
}
