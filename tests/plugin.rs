//! Plugin loading integration tests
//!
//! Tests the full host flow against fixture plugins compiled from
//! `tests/fixtures`.

#![allow(unsafe_code)]

use kiss_runtime::plugins::{PluginKind, library_file_name};
use kiss_runtime::{Config, Error, PluginManager, RegistryError};

mod common;
use common::{plugin_dir, stage};

type AddFn = extern "C" fn(i32, i32) -> i32;
type QueryFn = extern "C" fn() -> i32;

#[test]
fn load_and_enumerate() {
    let dir = plugin_dir(&["calc"]);
    let mut manager = PluginManager::new();

    let name = manager
        .load(&dir.path().join(library_file_name("calc")), None)
        .unwrap();
    assert_eq!(name, "calc");

    let plugins = manager.list();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].version(), "0.1.0");
    assert_eq!(plugins[0].kind(), PluginKind::Service);

    let infos = manager.capability_infos();
    let names: Vec<&str> = infos.iter().map(|i| i.capability.as_str()).collect();
    assert_eq!(names, vec!["calc_add", "calc_running", "calc_received"]);
    assert_eq!(infos[0].signature.as_deref(), Some("fn(i32, i32) -> i32"));
    assert!(infos[2].signature.is_none());
    assert!(infos.iter().all(|i| i.plugin == "calc"));
}

#[test]
fn invoke_plugin_capability() {
    let dir = plugin_dir(&["calc"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    let calc = manager.get("calc").unwrap();
    let sum = unsafe {
        calc.capabilities()
            .invoke("calc_add", "fn(i32, i32) -> i32", |f: AddFn| f(2, 3))
    }
    .unwrap();
    assert_eq!(sum, 5);
}

#[test]
fn skill_calls_required_capability() {
    let dir = plugin_dir(&["calc", "echo"]);
    let mut manager = PluginManager::new();

    let loaded = manager.load_dir(dir.path());
    assert_eq!(loaded.len(), 2);

    assert_eq!(manager.run_skill("echo").unwrap(), 42);
}

#[test]
fn skill_fails_without_required_plugin() {
    let dir = plugin_dir(&["echo"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    assert!(matches!(manager.run_skill("echo"), Err(Error::Plugin(_))));
}

#[test]
fn only_skills_run() {
    let dir = plugin_dir(&["calc"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    assert!(matches!(manager.run_skill("calc"), Err(Error::Plugin(_))));
}

#[test]
fn service_lifecycle() {
    let dir = plugin_dir(&["calc", "echo"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    assert_eq!(manager.start_services().unwrap(), 1);
    // Already running services are not started twice
    assert_eq!(manager.start_services().unwrap(), 0);

    let calc = manager.get("calc").unwrap();
    assert!(calc.is_started());

    let query = |name: &str| unsafe {
        calc.capabilities()
            .invoke(name, "fn() -> i32", |f: QueryFn| f())
            .unwrap()
    };
    assert_eq!(query("calc_running"), 1);
    // calc requires nothing, so its table was empty
    assert_eq!(query("calc_received"), 0);

    calc.stop().unwrap();
    assert!(!calc.is_started());
    assert_eq!(query("calc_running"), 0);
}

#[test]
fn start_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = stage(dir.path(), "calc");
    let attributes = serde_json::json!({ "fail": true });

    let mut manager = PluginManager::new();
    manager.load(&path, Some(&attributes)).unwrap();

    assert!(matches!(manager.start_services(), Err(Error::Plugin(_))));
    assert!(!manager.get("calc").unwrap().is_started());
}

#[test]
fn duplicate_plugin_rejected() {
    let dir = plugin_dir(&["calc"]);
    let path = dir.path().join(library_file_name("calc"));

    let mut manager = PluginManager::new();
    manager.load(&path, None).unwrap();

    assert!(matches!(
        manager.load(&path, None),
        Err(Error::PluginAlreadyLoaded(name)) if name == "calc"
    ));
    assert_eq!(manager.len(), 1);
}

#[test]
fn unload_refused_while_in_use() {
    let dir = plugin_dir(&["calc"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    let handle = manager.get("calc").unwrap();
    assert!(matches!(
        manager.unload("calc"),
        Err(Error::PluginInUse { handles: 1, .. })
    ));
    drop(handle);

    let host = manager.capabilities_for(&["calc".to_string()]);
    assert_eq!(host.len(), 3);
    assert_eq!(host.providers().collect::<Vec<_>>(), vec!["calc"]);
    assert!(matches!(
        manager.unload("calc"),
        Err(Error::PluginInUse { .. })
    ));
    drop(host);

    manager.unload("calc").unwrap();
    assert!(manager.is_empty());
}

#[test]
fn unload_stops_running_service() {
    let dir = plugin_dir(&["calc"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());
    manager.start_services().unwrap();

    manager.unload("calc").unwrap();
    assert!(manager.get("calc").is_none());
}

#[test]
fn load_from_config_file() {
    let dir = plugin_dir(&["calc", "echo"]);
    let config_path = dir.path().join("runtime.json");
    std::fs::write(
        &config_path,
        r#"{
            "plugin_dir": ".",
            "libraries": [
                { "name": "echo" },
                { "name": "calc", "attributes": { "interval_ms": 10 } },
                { "name": "missing" }
            ]
        }"#,
    )
    .unwrap();

    let config = Config::resolve(
        &config_path,
        kiss_runtime::config::file::load_config_file(&config_path).unwrap(),
        None,
    );

    let mut manager = PluginManager::new();
    let loaded = manager.load_all(&config.libraries, &config.plugin_dir);
    assert_eq!(loaded, vec!["echo", "calc"]);

    // Load order does not matter for requirements, only presence
    assert_eq!(manager.run_skill("echo").unwrap(), 42);
}

#[test]
fn provider_pinned_while_dependent_service_runs() {
    let dir = plugin_dir(&["calc", "watch"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());

    assert_eq!(manager.start_services().unwrap(), 2);

    // watch keeps calc_add from its start table
    assert!(matches!(
        manager.unload("calc"),
        Err(Error::PluginInUse { handles: 1, .. })
    ));
    assert!(manager.get("calc").unwrap().is_started());

    let watch = manager.get("watch").unwrap();
    let sum = unsafe {
        watch
            .capabilities()
            .invoke("watch_sum", "fn() -> i32", |f: QueryFn| f())
    }
    .unwrap();
    assert_eq!(sum, 42);
    drop(watch);

    manager.unload("watch").unwrap();
    manager.unload("calc").unwrap();
    assert!(manager.is_empty());
}

#[test]
fn consumer_listed_before_provider_drops_cleanly() {
    let dir = plugin_dir(&["calc", "watch"]);
    let entries = vec![
        kiss_runtime::config::LibraryEntry {
            name: "watch".to_string(),
            path: None,
            attributes: None,
        },
        kiss_runtime::config::LibraryEntry {
            name: "calc".to_string(),
            path: None,
            attributes: None,
        },
    ];

    let mut manager = PluginManager::new();
    assert_eq!(manager.load_all(&entries, dir.path()), vec!["watch", "calc"]);
    assert_eq!(manager.start_services().unwrap(), 2);

    let calc = manager.get("calc").unwrap();
    drop(manager);

    // Running services are stopped before any library is released
    assert!(!calc.is_started());
}

#[test]
fn stopped_service_releases_providers() {
    let dir = plugin_dir(&["calc", "watch"]);
    let mut manager = PluginManager::new();
    manager.load_dir(dir.path());
    manager.start_services().unwrap();

    manager.get("watch").unwrap().stop().unwrap();
    manager.unload("calc").unwrap();
    assert_eq!(manager.len(), 1);
}

#[test]
fn failed_stop_keeps_plugin_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = stage(dir.path(), "calc");
    let attributes = serde_json::json!({ "fail_stop": true });

    let mut manager = PluginManager::new();
    manager.load(&path, Some(&attributes)).unwrap();
    manager.start_services().unwrap();

    assert!(matches!(manager.unload("calc"), Err(Error::Plugin(_))));
    assert_eq!(manager.len(), 1);

    // The failed stop already marked the service stopped
    manager.unload("calc").unwrap();
    assert!(manager.is_empty());
}

#[test]
fn too_many_capabilities_rejected_at_load() {
    let dir = plugin_dir(&["wide"]);
    let mut manager = PluginManager::new();

    assert!(matches!(
        manager.load(&dir.path().join(library_file_name("wide")), None),
        Err(Error::Registry(RegistryError::CapacityExceeded { capacity: 20 }))
    ));
    assert!(manager.is_empty());
}
