//! Lamtamnix host: loads plugins into isolation contexts and reports their
//! resource usage.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use lamtamnix_core::config::{AppConfig, DiscoveryStrategy};
use lamtamnix_core::{IsolationHost, TypeDiscovery};
use lamtamnix_isolation::{AccountingAllocator, ThreadIsolationHost, enable_monitoring};
use lamtamnix_plugin::{ContainerObserver, Loader, ManifestDiscovery, PluginContainer, RegistryDiscovery};

#[global_allocator]
static ALLOC: AccountingAllocator = AccountingAllocator::system();

/// Lamtamnix plugin host
#[derive(Debug, Parser)]
#[command(name = "lamtamnix-host", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discovery strategy, overriding the configuration
    #[arg(short, long, value_parser = parse_strategy)]
    strategy: Option<DiscoveryStrategy>,

    /// Plugin directory for directory discovery
    #[arg(long)]
    plugins_dir: Option<String>,

    /// Manifest file for manifest discovery
    #[arg(long)]
    manifest: Option<String>,

    /// Observer interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Usage samples to print before exiting (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 3)]
    samples: u64,

    /// Objects each memory plugin allocates after loading
    #[arg(long, default_value_t = 1000)]
    grow: u64,
}

fn parse_strategy(value: &str) -> Result<DiscoveryStrategy, String> {
    match value {
        "registry" => Ok(DiscoveryStrategy::Registry),
        "manifest" => Ok(DiscoveryStrategy::Manifest),
        "directory" => Ok(DiscoveryStrategy::Directory),
        other => Err(format!("unknown strategy '{other}' (registry, manifest, directory)")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(&cli, config).await {
        tracing::error!("Host error: {e:#}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment, then apply CLI overrides.
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("config load error")?;

    if let Some(strategy) = cli.strategy {
        config.discovery.strategy = strategy;
    }
    if let Some(dir) = &cli.plugins_dir {
        config.discovery.directory = dir.clone();
    }
    if let Some(manifest) = &cli.manifest {
        config.discovery.manifest = Some(manifest.clone());
    }
    if let Some(ms) = cli.interval_ms {
        config.observer.update_interval_ms = ms;
    }
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .init();
        }
    }
}

fn build_discovery(config: &AppConfig) -> anyhow::Result<Arc<dyn TypeDiscovery>> {
    let registry = Arc::new(RegistryDiscovery::from_registrar(plugin_sample::register));

    let discovery: Arc<dyn TypeDiscovery> = match config.discovery.strategy {
        DiscoveryStrategy::Registry => registry,
        DiscoveryStrategy::Manifest => Arc::new(ManifestDiscovery::new(registry)),
        #[cfg(feature = "dynamic")]
        DiscoveryStrategy::Directory => Arc::new(lamtamnix_plugin::DirectoryDiscovery::new()),
        #[cfg(not(feature = "dynamic"))]
        DiscoveryStrategy::Directory => {
            anyhow::bail!("directory discovery requires the 'dynamic' feature")
        }
    };
    Ok(discovery)
}

async fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Lamtamnix host v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Monitoring must be on before any context exists ──
    if config.host.monitoring_enabled {
        enable_monitoring();
    } else {
        tracing::warn!("Resource monitoring disabled; usage samples will report errors");
    }

    // ── Step 2: Isolation host ───────────────────────────────────
    let host: Arc<dyn IsolationHost> = Arc::new(ThreadIsolationHost::from_config(&config.host));

    // ── Step 3: Load plugins ─────────────────────────────────────
    tracing::info!(strategy = ?config.discovery.strategy, "Loading plugins...");
    let discovery = build_discovery(&config)?;
    let loader = Loader::new(Arc::clone(&host));
    let container = Arc::new(
        loader
            .load_async(discovery, config.discovery.clone())
            .await
            .context("plugin load failed")?,
    );

    for handle in container.plugins()? {
        let type_name = container.type_name(handle)?;
        tracing::info!(handle = %handle, plugin = %type_name, "Plugin ready");
        if cli.grow > 0 && type_name.ends_with("MemoryPlugin") {
            let objects = container.invoke(handle, "increase_memory_usage", serde_json::json!({ "count": cli.grow }))?;
            tracing::info!(handle = %handle, objects = %objects, "Memory plugin grown");
        }
    }

    // ── Step 4: Observe usage ────────────────────────────────────
    let observer = ContainerObserver::new(Arc::clone(&container), config.observer.update_interval())?;
    let (subscription, mut events) = observer.subscribe_channel();

    let mut printed = 0;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_usage(&event);
                printed += 1;
                if cli.samples > 0 && printed >= cli.samples {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    observer.unsubscribe(subscription);
    drop(observer);

    // ── Step 5: Dispose ──────────────────────────────────────────
    shutdown(&container).await?;
    tracing::info!(live_contexts = host.live_contexts(), "Lamtamnix host stopped");
    Ok(())
}

fn print_usage(event: &lamtamnix_plugin::UsageEvent) {
    for (handle, usage) in &event.usage {
        tracing::info!(
            sequence = event.sequence,
            handle = %handle.short(),
            context = %usage.friendly_name,
            total_allocated_bytes = usage.total_allocated_bytes,
            live_bytes = usage.live_bytes,
            processor_time_us = usage.processor_time.as_micros() as u64,
            loaded_modules = usage.loaded_modules,
            "Usage"
        );
    }
}

async fn shutdown(container: &Arc<PluginContainer>) -> anyhow::Result<()> {
    let container = Arc::clone(container);
    let report = tokio::task::spawn_blocking(move || container.dispose())
        .await
        .context("dispose task failed")??;

    for fault in &report.faults {
        tracing::warn!(context = %fault.context_name, reason = %fault.reason, "Teardown fault");
    }
    tracing::info!(
        destroyed = report.destroyed.len(),
        faults = report.faults.len(),
        "Plugins disposed"
    );
    Ok(())
}
