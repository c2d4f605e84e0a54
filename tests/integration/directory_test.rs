//! Directory discovery against the `plugin_sample` shared library cargo
//! builds alongside the test binaries.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};

use lamtamnix_core::config::DiscoveryConfig;
use lamtamnix_core::{DescriptorOrigin, IsolationHost, PLUGIN_CAPABILITY, PluginKind, TypeDiscovery};
use lamtamnix_isolation::{MonitoringSwitch, ThreadIsolationHost};
use lamtamnix_plugin::{DirectoryDiscovery, Loader};

/// Locate the sample cdylib next to the running test executable.
fn sample_library() -> PathBuf {
    let exe = std::env::current_exe().expect("current exe");
    let dir = exe.parent().expect("exe directory");
    let file_name = format!("{DLL_PREFIX}plugin_sample.{DLL_EXTENSION}");

    [dir.to_path_buf(), dir.join("deps"), dir.join("..")]
        .into_iter()
        .map(|candidate| candidate.join(&file_name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("{file_name} not found near {}", dir.display()))
}

/// A fresh directory holding a copy of the sample library.
fn plugin_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let library = sample_library();
    let file_name = library.file_name().expect("file name");
    fs::copy(&library, dir.path().join(file_name)).expect("copy library");
    dir
}

#[test]
fn test_discovers_types_exported_by_library() {
    let dir = plugin_dir();
    let name = format!("broken.{DLL_EXTENSION}");
    fs::write(dir.path().join(name), b"not a shared library").expect("write");

    let descriptors = DirectoryDiscovery::new()
        .with_directory(dir.path())
        .discover(&DiscoveryConfig::default())
        .expect("discover");

    let mut names: Vec<&str> = descriptors.iter().map(|d| d.type_name()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec!["plugin_sample::BasePlugin", "plugin_sample::EchoPlugin", "plugin_sample::MemoryPlugin"]
    );

    let concrete = descriptors
        .iter()
        .filter(|d| d.kind() == PluginKind::Concrete && d.is_instantiable_as(PLUGIN_CAPABILITY))
        .count();
    let abstract_types = descriptors.iter().filter(|d| d.kind() == PluginKind::Abstract).count();
    assert_eq!(concrete, 2);
    assert_eq!(abstract_types, 1);

    for descriptor in &descriptors {
        assert!(matches!(descriptor.origin(), DescriptorOrigin::Library { path } if path.starts_with(dir.path())));
        assert_eq!(descriptor.loaded_modules(), 1);
        assert!(descriptor.keep_alive().is_some());
    }
}

#[test]
fn test_library_plugins_outlive_discovery() {
    let dir = plugin_dir();
    let switch = MonitoringSwitch::local();
    switch.enable();
    let host = Arc::new(ThreadIsolationHost::new().with_monitoring(switch));

    let config = DiscoveryConfig {
        directory: dir.path().to_string_lossy().into_owned(),
        ..DiscoveryConfig::default()
    };
    let container = Loader::new(host.clone())
        .load(Arc::new(DirectoryDiscovery::new()), &config)
        .expect("load");

    // The descriptors from discovery are gone; each context keeps its library mapped.
    let handles = container.plugins().expect("plugins");
    assert_eq!(handles.len(), 2);
    let echo = handles
        .iter()
        .copied()
        .find(|h| container.type_name(*h).expect("type") == "plugin_sample::EchoPlugin")
        .expect("echo plugin");
    assert_eq!(
        container.invoke(echo, "echo", json!({ "from": "library" })).expect("echo"),
        json!({ "from": "library" })
    );
    assert_eq!(container.invoke(echo, "calls", Value::Null).expect("calls"), json!(2));

    let usage = container.resources_usage().expect("usage");
    assert_eq!(usage.len(), 2);
    assert!(usage.values().all(|snapshot| snapshot.loaded_modules == 1));

    let report = container.dispose().expect("dispose");
    assert!(report.is_clean());
    assert_eq!(host.live_contexts(), 0);
}
