//! Shared-library discovery using `libloading`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info, warn};

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{AppError, AppResult, DescriptorOrigin, PluginTypeDescriptor, TypeDiscovery};

use super::{ABI_SYMBOL, PLUGIN_ABI_VERSION, PluginRegistrar, REGISTER_SYMBOL, RegisterFn};

/// Loads every shared library in a directory and collects the plugin types
/// it registers through [`export_plugins!`](crate::export_plugins).
///
/// Files that fail to load, lack the registration symbol, or were built
/// against another ABI version are skipped. Each returned descriptor keeps
/// its library mapped until the last plugin built from it is dropped.
///
/// Only point this at trusted directories: loading a library runs its code.
#[derive(Debug, Clone, Default)]
pub struct DirectoryDiscovery {
    directory: Option<PathBuf>,
}

impl DirectoryDiscovery {
    /// Scan `DiscoveryConfig::directory`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `directory` instead of the configured one.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    fn candidates(directory: &Path) -> AppResult<Vec<PathBuf>> {
        let entries = fs::read_dir(directory).map_err(|e| {
            AppError::with_source(
                lamtamnix_core::ErrorKind::Discovery,
                format!("cannot read plugin directory '{}'", directory.display()),
                e,
            )
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn load_library(path: &Path) -> Result<Vec<PluginTypeDescriptor>, String> {
        // SAFETY: loading runs the library's initialisers; callers only scan
        // directories they trust.
        let library = unsafe { Library::new(path) }.map_err(|e| format!("load failed: {e}"))?;

        // SAFETY: the symbol is a `u32` static emitted by `export_plugins!`.
        let abi = unsafe { library.get::<*const u32>(ABI_SYMBOL.as_bytes()) }
            .map_err(|e| format!("missing '{ABI_SYMBOL}': {e}"))?;
        // SAFETY: the pointer targets a static inside the still-loaded library.
        check_abi(unsafe { **abi })?;

        let mut registrar = PluginRegistrar::new();
        {
            // SAFETY: `export_plugins!` generates this symbol with the `RegisterFn` signature.
            let register = unsafe { library.get::<RegisterFn>(REGISTER_SYMBOL.as_bytes()) }
                .map_err(|e| format!("missing '{REGISTER_SYMBOL}': {e}"))?;
            register(&mut registrar);
        }

        let library: Arc<Library> = Arc::new(library);
        let origin = DescriptorOrigin::Library {
            path: path.to_path_buf(),
        };
        Ok(registrar
            .into_descriptors()
            .into_iter()
            .map(|descriptor| {
                descriptor
                    .with_origin(origin.clone())
                    .with_keep_alive(library.clone())
            })
            .collect())
    }
}

fn check_abi(version: u32) -> Result<(), String> {
    if version == PLUGIN_ABI_VERSION {
        Ok(())
    } else {
        Err(format!("ABI version {version}, host expects {PLUGIN_ABI_VERSION}"))
    }
}

impl TypeDiscovery for DirectoryDiscovery {
    fn discover(&self, config: &DiscoveryConfig) -> AppResult<Vec<PluginTypeDescriptor>> {
        let directory = self
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.directory));

        let mut found = Vec::new();
        for path in Self::candidates(&directory)? {
            match Self::load_library(&path) {
                Ok(descriptors) => {
                    debug!(path = %path.display(), types = descriptors.len(), "Plugin library loaded");
                    found.extend(descriptors);
                }
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "Skipping plugin library");
                }
            }
        }

        info!(directory = %directory.display(), types = found.len(), "Directory discovery finished");
        Ok(found)
    }
}
