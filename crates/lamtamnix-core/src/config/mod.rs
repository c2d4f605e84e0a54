//! Host configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from an
//! optional TOML file overlaid with `LAMTAMNIX__*` environment variables.
//! Every field has a default, so an empty source is a valid configuration.

pub mod discovery;
pub mod host;
pub mod logging;
pub mod observer;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::discovery::{DiscoveryConfig, DiscoveryStrategy};
pub use self::host::HostConfig;
pub use self::logging::LoggingConfig;
pub use self::observer::ObserverConfig;

use crate::error::AppError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Isolation host settings.
    #[serde(default)]
    pub host: HostConfig,
    /// Resource observer settings.
    #[serde(default)]
    pub observer: ObserverConfig,
    /// Plugin discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Reads `path` when given (it must exist), then applies environment
    /// variables prefixed with `LAMTAMNIX`, e.g.
    /// `LAMTAMNIX__OBSERVER__UPDATE_INTERVAL_MS=1000`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("LAMTAMNIX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
