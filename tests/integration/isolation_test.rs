//! End-to-end tests against the thread-backed isolation host and the sample
//! plugins, with allocation accounting installed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use lamtamnix_core::config::{DiscoveryConfig, HostConfig};
use lamtamnix_core::{ErrorKind, IsolationHost, PluginHandle};
use lamtamnix_isolation::{AccountingAllocator, MonitoringSwitch, ThreadIsolationHost};
use lamtamnix_plugin::{ContainerObserver, Loader, PluginContainer, RegistryDiscovery};

#[global_allocator]
static ALLOC: AccountingAllocator = AccountingAllocator::system();

fn host(monitoring: bool) -> (Arc<ThreadIsolationHost>, MonitoringSwitch) {
    let switch = MonitoringSwitch::local();
    if monitoring {
        switch.enable();
    }
    let config = HostConfig {
        context_name_prefix: "it".to_string(),
        ..HostConfig::default()
    };
    let host = Arc::new(ThreadIsolationHost::from_config(&config).with_monitoring(switch.clone()));
    (host, switch)
}

fn load_samples(host: &Arc<ThreadIsolationHost>) -> PluginContainer {
    let discovery = Arc::new(RegistryDiscovery::from_registrar(plugin_sample::register));
    Loader::new(host.clone())
        .load(discovery, &DiscoveryConfig::default())
        .expect("load samples")
}

fn handle_of(container: &PluginContainer, suffix: &str) -> PluginHandle {
    container
        .plugins()
        .expect("plugins")
        .into_iter()
        .find(|h| container.type_name(*h).expect("type").ends_with(suffix))
        .expect("plugin present")
}

#[test]
fn test_sample_plugins_load_in_separate_threads() {
    let (host, _switch) = host(true);
    let container = load_samples(&host);

    // The abstract base is skipped.
    assert_eq!(container.plugins().expect("plugins").len(), 2);
    assert_eq!(host.live_contexts(), 2);

    let echo = handle_of(&container, "EchoPlugin");
    let memory = handle_of(&container, "MemoryPlugin");
    assert_ne!(container.context_of(echo).expect("ctx"), container.context_of(memory).expect("ctx"));

    let thread = container.invoke(echo, "thread", Value::Null).expect("thread");
    let expected = format!("ctx-{}", container.context_of(echo).expect("ctx").short());
    assert_eq!(thread, json!(expected));

    assert_eq!(container.invoke(memory, "get_int", Value::Null).expect("call"), json!(42));

    let report = container.dispose().expect("dispose");
    assert!(report.is_clean());
    assert_eq!(host.live_contexts(), 0);
}

#[test]
fn test_friendly_names_are_unique() {
    let (host, _switch) = host(true);
    let container = load_samples(&host);

    let usage = container.resources_usage().expect("usage");
    let mut names: Vec<String> = usage.values().map(|u| u.friendly_name.clone()).collect();
    names.sort();
    // Context 1 was the discovery context.
    assert_eq!(names, vec!["it-echoplugin-2", "it-memoryplugin-3"]);
}

#[test]
fn test_usage_tracks_allocations_and_processor_time() {
    let (host, _switch) = host(true);
    let container = load_samples(&host);
    let memory = handle_of(&container, "MemoryPlugin");
    let echo = handle_of(&container, "EchoPlugin");

    let before = container.resources_usage().expect("usage");

    container
        .invoke(memory, "increase_memory_usage", json!({ "count": 10_000 }))
        .expect("grow");
    container.invoke(memory, "busy", json!({ "millis": 50 })).expect("busy");

    let grown = container.resources_usage().expect("usage");
    let grown_memory = &grown[&memory];
    let grew_by = grown_memory.total_allocated_bytes - before[&memory].total_allocated_bytes;
    assert!(grew_by >= 10_000 * 64, "allocated only {grew_by} bytes");
    assert!(grown_memory.live_bytes >= 10_000 * 64);
    assert!(grown_memory.processor_time >= Duration::from_millis(10));
    assert_eq!(grown_memory.loaded_modules, 0);

    // The other context was not charged for that work.
    assert!(grown[&echo].total_allocated_bytes < 10_000 * 64);

    container.invoke(memory, "release", Value::Null).expect("release");
    let released = container.resources_usage().expect("usage");
    assert!(released[&memory].live_bytes < grown_memory.live_bytes);
    assert!(released[&memory].total_allocated_bytes >= grown_memory.total_allocated_bytes);
}

#[test]
fn test_usage_gated_by_monitoring_switch() {
    let (host, switch) = host(false);
    let container = load_samples(&host);

    let err = container.resources_usage().expect_err("monitoring off");
    assert_eq!(err.kind, ErrorKind::MonitoringDisabled);

    switch.enable();
    let usage = container.resources_usage().expect("monitoring on");
    assert_eq!(usage.len(), 2);
}

#[test]
fn test_plugin_errors_surface_as_invocation_errors() {
    let (host, _switch) = host(true);
    let container = load_samples(&host);
    let memory = handle_of(&container, "MemoryPlugin");

    let err = container
        .invoke(memory, "increase_memory_usage", json!({ "count": "lots" }))
        .expect_err("bad args");
    assert_eq!(err.kind, ErrorKind::Invocation);

    let err = container.invoke(memory, "no_such_method", Value::Null).expect_err("unknown");
    assert_eq!(err.kind, ErrorKind::Invocation);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_observer_over_real_host() {
    let (host, _switch) = host(true);
    let container = Arc::new(load_samples(&host));
    let observer = ContainerObserver::new(Arc::clone(&container), Duration::from_millis(20)).expect("observer");

    let (id, mut events) = observer.subscribe_channel();
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("tick")
        .expect("event");
    assert_eq!(event.usage.len(), 2);
    assert!(observer.unsubscribe(id));

    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["sequence"], json!(1));

    drop(observer);
    container.dispose().expect("dispose");
    assert_eq!(host.live_contexts(), 0);
}
