//! Integration tests for container disposal and usage queries.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde_json::json;

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{ErrorKind, IsolationHost, TeardownFaultReason};
use lamtamnix_plugin::{Loader, PluginContainer};

use helpers::{FakeHost, ListDiscovery};

fn load(host: &Arc<FakeHost>, names: &[&str]) -> PluginContainer {
    Loader::new(host.clone())
        .load(ListDiscovery::named(names), &DiscoveryConfig::default())
        .expect("load")
}

#[test]
fn test_double_dispose_is_an_error() {
    let host = Arc::new(FakeHost::new());
    let container = load(&host, &["t::A", "t::B"]);
    assert_eq!(container.plugins().expect("plugins").len(), 2);

    let report = container.dispose().expect("first dispose");
    assert_eq!(report.destroyed.len(), 2);

    let err = container.dispose().expect_err("second dispose");
    assert_eq!(err.kind, ErrorKind::Disposed);
}

#[test]
fn test_operations_after_dispose_fail() {
    let host = Arc::new(FakeHost::new());
    let container = load(&host, &["t::A", "t::B"]);
    let handle = container.plugins().expect("plugins")[0];
    container.dispose().expect("dispose");

    assert_eq!(container.plugins().expect_err("plugins").kind, ErrorKind::Disposed);
    assert_eq!(container.resources_usage().expect_err("usage").kind, ErrorKind::Disposed);
    assert_eq!(container.type_name(handle).expect_err("type").kind, ErrorKind::Disposed);
    assert_eq!(
        container.invoke(handle, "ping", json!(null)).expect_err("invoke").kind,
        ErrorKind::Disposed
    );
    assert_eq!(container.dispose().expect_err("dispose").kind, ErrorKind::Disposed);
}

#[test]
fn test_teardown_fault_does_not_stop_disposal() {
    let host = Arc::new(FakeHost::new().fault_on_destroy(2));
    let container = load(&host, &["t::One", "t::Two", "t::Three", "t::Four", "t::Five"]);

    let report = container.dispose().expect("dispose");

    assert_eq!(report.faults.len(), 1);
    assert_eq!(
        report.faults[0].reason,
        TeardownFaultReason::UnloadFailed("scripted fault".to_string())
    );
    assert_eq!(report.destroyed.len(), 4);
    assert!(!report.is_clean());

    // Discovery context first, then every plugin context including the faulty one.
    let mut attempts = host.destroy_attempts();
    assert_eq!(attempts.remove(0), 0);
    attempts.sort_unstable();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(host.live_contexts(), 0);
    assert!(container.is_disposed());
}

#[test]
fn test_usage_requires_monitoring() {
    let host = Arc::new(FakeHost::new().without_monitoring());
    let container = load(&host, &["t::A", "t::B", "t::C"]);

    let err = container.resources_usage().expect_err("monitoring off");
    assert_eq!(err.kind, ErrorKind::MonitoringDisabled);

    host.enable_monitoring();
    let usage = container.resources_usage().expect("monitoring on");
    assert_eq!(usage.len(), 3);
    for handle in container.plugins().expect("plugins") {
        assert!(usage.contains_key(&handle));
    }
}

#[test]
fn test_empty_container_usage_requires_monitoring() {
    let host = Arc::new(FakeHost::new().without_monitoring());
    let container = load(&host, &[]);
    assert!(container.is_empty().expect("len"));

    let err = container.resources_usage().expect_err("monitoring off");
    assert_eq!(err.kind, ErrorKind::MonitoringDisabled);
    assert_eq!(host.queries(), 0);

    host.enable_monitoring();
    assert!(container.resources_usage().expect("monitoring on").is_empty());
}

#[test]
fn test_invoke_reaches_owning_context() {
    let host = Arc::new(FakeHost::new());
    let container = load(&host, &["t::A"]);
    let handle = container.plugins().expect("plugins")[0];

    let reply = container.invoke(handle, "ping", json!({ "n": 1 })).expect("invoke");
    assert_eq!(reply, json!({ "method": "ping", "args": { "n": 1 } }));
}

#[test]
fn test_dispose_waits_for_in_flight_queries() {
    let host = Arc::new(FakeHost::new().slow_queries(Duration::from_millis(5)));
    let container = Arc::new(load(&host, &["t::A", "t::B", "t::C"]));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let container = Arc::clone(&container);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while !done.load(Ordering::SeqCst) {
                    match container.resources_usage() {
                        Ok(usage) => assert_eq!(usage.len(), 3),
                        Err(err) => {
                            seen.push(err.kind);
                            break;
                        }
                    }
                }
                seen
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    container.dispose().expect("dispose");
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        let kinds = reader.join().expect("reader thread");
        // A query either saw every context or saw the disposed state.
        assert!(kinds.iter().all(|kind| *kind == ErrorKind::Disposed));
    }
}

#[tokio::test]
async fn test_resources_usage_async() {
    let host = Arc::new(FakeHost::new());
    let container = Arc::new(load(&host, &["t::A", "t::B"]));

    let usage = Arc::clone(&container).resources_usage_async().await.expect("usage");
    assert_eq!(usage.len(), 2);

    container.dispose().expect("dispose");
    let err = Arc::clone(&container)
        .resources_usage_async()
        .await
        .expect_err("disposed");
    assert_eq!(err.kind, ErrorKind::Disposed);
}

#[test]
fn test_drop_disposes_live_container() {
    let host = Arc::new(FakeHost::new());
    let container = load(&host, &["t::A", "t::B"]);
    assert_eq!(host.live_contexts(), 2);
    drop(container);
    assert_eq!(host.live_contexts(), 0);
}
