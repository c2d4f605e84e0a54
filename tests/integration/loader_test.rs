//! Integration tests for the load cycle.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{ErrorKind, IsolationHost, PluginTypeDescriptor};
use lamtamnix_plugin::Loader;

use helpers::{FakeHost, HostEvent, ListDiscovery};

#[test]
fn test_load_creates_one_context_per_plugin() {
    let host = Arc::new(FakeHost::new());
    let loader = Loader::new(host.clone());

    let names = ["t::One", "t::Two", "t::Three", "t::Four"];
    let container = loader
        .load(ListDiscovery::named(&names), &DiscoveryConfig::default())
        .expect("load");

    let handles = container.plugins().expect("plugins");
    assert_eq!(handles.len(), names.len());

    let contexts: HashSet<_> = handles
        .iter()
        .map(|h| container.context_of(*h).expect("context"))
        .collect();
    assert_eq!(contexts.len(), names.len());

    // Discovery context is gone; one live context per plugin.
    assert_eq!(host.live_contexts(), names.len());
    assert_eq!(host.destroy_attempts(), vec![0]);
}

#[test]
fn test_load_instantiates_sequentially() {
    let host = Arc::new(FakeHost::new());
    let loader = Loader::new(host.clone());
    let _container = loader
        .load(ListDiscovery::named(&["t::A", "t::B"]), &DiscoveryConfig::default())
        .expect("load");

    assert_eq!(
        host.events(),
        vec![
            HostEvent::Created { ordinal: 0 },
            HostEvent::Destroyed { ordinal: 0 },
            HostEvent::Created { ordinal: 1 },
            HostEvent::Instantiated { ordinal: 1, type_name: "t::A".to_string() },
            HostEvent::Created { ordinal: 2 },
            HostEvent::Instantiated { ordinal: 2, type_name: "t::B".to_string() },
        ]
    );
}

#[test]
fn test_abstract_and_foreign_types_are_filtered() {
    let host = Arc::new(FakeHost::new());
    let loader = Loader::new(host.clone());

    let discovery = ListDiscovery::new(vec![
        helpers::descriptor("t::Concrete"),
        PluginTypeDescriptor::abstract_type("t::Base", lamtamnix_core::PLUGIN_CAPABILITY),
        PluginTypeDescriptor::concrete("t::Other", "other/v1", || Ok(Box::new(helpers::NopPlugin))),
    ]);

    let container = loader.load(discovery, &DiscoveryConfig::default()).expect("load");
    let handles = container.plugins().expect("plugins");
    assert_eq!(handles.len(), 1);
    assert_eq!(container.type_name(handles[0]).expect("type"), "t::Concrete");
}

#[test]
fn test_capability_comes_from_config() {
    let host = Arc::new(FakeHost::new());
    let loader = Loader::new(host.clone());
    let discovery = ListDiscovery::new(vec![
        helpers::descriptor("t::Default"),
        PluginTypeDescriptor::concrete("t::Other", "other/v1", || Ok(Box::new(helpers::NopPlugin))),
    ]);

    let config = DiscoveryConfig {
        capability: "other/v1".to_string(),
        ..DiscoveryConfig::default()
    };
    let container = loader.load(discovery, &config).expect("load");
    let handles = container.plugins().expect("plugins");
    assert_eq!(handles.len(), 1);
    assert_eq!(container.type_name(handles[0]).expect("type"), "t::Other");
}

#[test]
fn test_instantiation_failure_aborts_and_rolls_back() {
    let host = Arc::new(FakeHost::new().failing_type("t::Bad"));
    let loader = Loader::new(host.clone());

    let err = loader
        .load(ListDiscovery::named(&["t::A", "t::Bad", "t::C"]), &DiscoveryConfig::default())
        .expect_err("load must fail");
    assert_eq!(err.kind, ErrorKind::Instantiation);

    // A and the context created for Bad are torn down; C is never attempted.
    assert_eq!(host.live_contexts(), 0);
    assert_eq!(host.destroy_attempts(), vec![0, 1, 2]);
    assert!(!host.events().iter().any(|e| matches!(
        e,
        HostEvent::Instantiated { type_name, .. } if type_name == "t::C"
    )));
}

#[test]
fn test_rollback_continues_past_teardown_faults() {
    let host = Arc::new(FakeHost::new().failing_type("t::Bad").fault_on_destroy(1));
    let loader = Loader::new(host.clone());

    let err = loader
        .load(ListDiscovery::named(&["t::A", "t::B", "t::Bad"]), &DiscoveryConfig::default())
        .expect_err("load must fail");
    assert_eq!(err.kind, ErrorKind::Instantiation);
    assert_eq!(host.live_contexts(), 0);
    assert_eq!(host.destroy_attempts(), vec![0, 1, 2, 3]);
}

#[test]
fn test_discovery_failure_still_destroys_transient_context() {
    let host = Arc::new(FakeHost::new());
    let loader = Loader::new(host.clone());

    let err = loader
        .load(ListDiscovery::failing("directory vanished"), &DiscoveryConfig::default())
        .expect_err("discovery error");
    assert_eq!(err.kind, ErrorKind::Discovery);
    assert_eq!(host.live_contexts(), 0);
    assert_eq!(host.destroy_attempts(), vec![0]);
}

#[test]
fn test_empty_discovery_yields_empty_container() {
    let host = Arc::new(FakeHost::new());
    let container = Loader::new(host.clone())
        .load(ListDiscovery::named(&[]), &DiscoveryConfig::default())
        .expect("load");
    assert!(container.is_empty().expect("len"));
    assert_eq!(host.live_contexts(), 0);
}

#[tokio::test]
async fn test_load_async_matches_sync() {
    let host = Arc::new(FakeHost::new().failing_type("t::Bad"));
    let loader = Loader::new(host.clone());

    let container = loader
        .load_async(ListDiscovery::named(&["t::A", "t::B"]), DiscoveryConfig::default())
        .await
        .expect("load");
    assert_eq!(container.plugins().expect("plugins").len(), 2);

    let err = loader
        .load_async(ListDiscovery::named(&["t::Bad"]), DiscoveryConfig::default())
        .await
        .expect_err("load must fail");
    assert_eq!(err.kind, ErrorKind::Instantiation);

    // Only the first container's contexts survive.
    assert_eq!(host.live_contexts(), 2);
}
