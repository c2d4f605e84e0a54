//! Newtype wrappers around [`uuid::Uuid`] for host identifiers.
//!
//! Identifiers are random v4 UUIDs, so an id is never reused while the
//! object it names is alive. Distinct types keep a `ContextId` from being
//! passed where a `PluginHandle` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines an opaque UUID-backed identifier.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocate a fresh identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The first eight hex digits, for log lines and thread names.
            pub fn short(&self) -> String {
                let mut text = self.0.simple().to_string();
                text.truncate(8);
                text
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of one isolation context.
    ContextId
);

define_id!(
    /// Opaque reference to a plugin instance inside a container.
    PluginHandle
);

define_id!(
    /// Identifier of a listener registered with a container observer.
    SubscriptionId
);
