//! Integration tests for the install → activate → resolve lifecycle.
//!
//! Each test drives [`AssetCacheManager`] against memory or filesystem
//! storage and a canned network; no real network calls are made.

use std::sync::Arc;
use upkeep_cache::{
    AssetCacheManager, AssetRequest, CacheConfig, CacheStorage, FilesystemStorage, MemoryStorage,
    StaticNetwork,
};

const SHELL: [&str; 3] = ["/", "/index.html", "/manifest.json"];

fn config(version: &str) -> CacheConfig {
    CacheConfig {
        version: version.to_owned(),
        manifest: SHELL.iter().map(|p| (*p).to_owned()).collect(),
        origin: Some("https://app.example".to_owned()),
        ..CacheConfig::default()
    }
}

fn shell_network() -> Arc<StaticNetwork> {
    Arc::new(
        StaticNetwork::new()
            .with_asset("/", "root")
            .with_asset("/index.html", "index")
            .with_asset("/manifest.json", "{}"),
    )
}

async fn install_and_activate(storage: Arc<dyn CacheStorage>, network: Arc<StaticNetwork>, version: &str) {
    let manager = AssetCacheManager::new(&config(version), storage, network).expect("manager");
    manager.install().await.expect("install");
    manager.activate().await.expect("activate");
}

#[tokio::test]
async fn version_bump_leaves_only_the_new_generation() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let network = shell_network();

    install_and_activate(Arc::clone(&storage), Arc::clone(&network), "v1").await;
    install_and_activate(Arc::clone(&storage), Arc::clone(&network), "v2").await;

    assert_eq!(storage.keys().await.expect("keys"), vec!["v2"]);
    assert_eq!(storage.entries("v2").await.expect("entries"), SHELL.to_vec());
    assert!(!storage.has("v1").await.expect("has"));
}

#[tokio::test]
async fn version_bump_on_filesystem_storage() {
    let temp = tempfile::tempdir().expect("tempdir");
    let storage: Arc<dyn CacheStorage> =
        Arc::new(FilesystemStorage::new(temp.path()).await.expect("storage"));
    let network = shell_network();

    install_and_activate(Arc::clone(&storage), Arc::clone(&network), "v1").await;
    install_and_activate(Arc::clone(&storage), Arc::clone(&network), "v2").await;

    assert_eq!(storage.keys().await.expect("keys"), vec!["v2"]);
    assert_eq!(storage.entries("v2").await.expect("entries"), SHELL.to_vec());
}

#[tokio::test]
async fn reinstalling_same_version_is_idempotent() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let manager =
        AssetCacheManager::new(&config("v1"), Arc::clone(&storage), shell_network()).expect("manager");

    manager.install().await.expect("first install");
    manager.install().await.expect("second install");

    assert_eq!(storage.keys().await.expect("keys"), vec!["v1"]);
    assert_eq!(storage.entries("v1").await.expect("entries"), SHELL.to_vec());
}

#[tokio::test]
async fn many_version_changes_converge_on_final_version() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let network = shell_network();

    for version in ["a", "b", "a", "c", "c", "d"] {
        install_and_activate(Arc::clone(&storage), Arc::clone(&network), version).await;
    }

    assert_eq!(storage.keys().await.expect("keys"), vec!["d"]);
}

#[tokio::test]
async fn failed_upgrade_keeps_serving_previous_generation() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let network = shell_network();
    install_and_activate(Arc::clone(&storage), Arc::clone(&network), "v1").await;

    network.remove("/manifest.json");
    let upgrade =
        AssetCacheManager::new(&config("v2"), Arc::clone(&storage), network.clone()).expect("manager");
    assert!(upgrade.install().await.is_err());
    assert!(!storage.has("v2").await.expect("has"));

    let current =
        AssetCacheManager::new(&config("v1"), Arc::clone(&storage), network.clone()).expect("manager");
    let response = current
        .resolve(&AssetRequest::get("/manifest.json"))
        .await
        .expect("served from v1 while offline");
    assert_eq!(response.body.as_ref(), b"{}");
}

#[tokio::test]
async fn cached_shell_is_served_with_network_gone() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
    let network = shell_network();
    let manager =
        AssetCacheManager::new(&config("v1"), Arc::clone(&storage), network.clone()).expect("manager");
    manager.install().await.expect("install");
    manager.activate().await.expect("activate");

    for path in SHELL {
        network.remove(path);
    }
    let before = network.calls();

    for path in SHELL {
        let url = format!("https://app.example{path}");
        assert!(manager.resolve(&AssetRequest::get(url)).await.is_some());
    }
    assert_eq!(network.calls(), before);
    assert!(manager.resolve(&AssetRequest::get("/styles.css")).await.is_none());
}
