//! Integration tests for the worker lifecycle through the event channel.
//!
//! Uses filesystem cache storage in a temp directory so that successive
//! worker generations share the same caches, as they do in a real host.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use upkeep::config::WorkerConfig;
use upkeep::host::ChannelHost;
use upkeep::worker::{
    ClientInfo, EventOutcome, WorkerDispatcher, WorkerEvent, WorkerState, worker_channel,
};
use upkeep_cache::{AssetRequest, CacheStorage, FilesystemStorage, StaticNetwork, StorageKind};

fn config(version: &str, dir: &Path) -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.cache.version = version.to_owned();
    config.cache.storage = StorageKind::Filesystem;
    config.cache.storage_dir = Some(dir.to_path_buf());
    config
}

fn shell() -> Arc<StaticNetwork> {
    Arc::new(
        StaticNetwork::new()
            .with_asset("/", "root")
            .with_asset("/index.html", "index")
            .with_asset("/manifest.json", "{}"),
    )
}

async fn run_generation(version: &str, dir: &Path, network: Arc<StaticNetwork>) -> WorkerDispatcher {
    let (host, _effects) = ChannelHost::new();
    let dispatcher = WorkerDispatcher::with_network(&config(version, dir), network, Arc::new(host))
        .await
        .expect("dispatcher");
    let (client, server) = worker_channel(4, dispatcher);
    let handle = tokio::spawn(server.run());

    client.send(WorkerEvent::Install).await.expect("install");
    client.send(WorkerEvent::Activate).await.expect("activate");

    drop(client);
    handle.await.expect("server task")
}

#[tokio::test]
async fn upgrade_from_v1_to_v2_leaves_only_v2() {
    let temp = tempfile::tempdir().expect("tempdir");
    let network = shell();

    run_generation("v1", temp.path(), Arc::clone(&network)).await;
    let worker = run_generation("v2", temp.path(), Arc::clone(&network)).await;
    assert_eq!(worker.state(), WorkerState::Activated);

    let storage = FilesystemStorage::new(temp.path()).await.expect("storage");
    assert_eq!(storage.keys().await.expect("keys"), vec!["v2"]);
    assert_eq!(
        storage.entries("v2").await.expect("entries"),
        vec!["/", "/index.html", "/manifest.json"]
    );
}

#[tokio::test]
async fn upgrade_removes_generation_with_corrupt_metadata() {
    let temp = tempfile::tempdir().expect("tempdir");
    let network = shell();
    run_generation("v1", temp.path(), Arc::clone(&network)).await;

    let v1_dir = std::fs::read_dir(temp.path())
        .expect("storage root")
        .filter_map(|item| item.ok())
        .find(|item| item.path().is_dir())
        .expect("v1 directory")
        .path();
    std::fs::write(v1_dir.join("cache.json"), b"{\"name\":\"v").expect("truncate metadata");

    let (host, _effects) = ChannelHost::new();
    let mut upgrade =
        WorkerDispatcher::with_network(&config("v2", temp.path()), network, Arc::new(host))
            .await
            .expect("dispatcher");
    upgrade.dispatch(WorkerEvent::Install).await.expect("install");
    let outcome = upgrade.dispatch(WorkerEvent::Activate).await.expect("activate");

    let EventOutcome::Activated { deleted, failed, .. } = outcome else {
        panic!("expected activation");
    };
    assert_eq!(deleted.len(), 1);
    assert!(failed.is_empty());
    assert!(!v1_dir.exists());
    let dirs = std::fs::read_dir(temp.path()).expect("storage root").count();
    assert_eq!(dirs, 1);
}

#[tokio::test]
async fn activated_worker_serves_shell_offline() {
    let temp = tempfile::tempdir().expect("tempdir");
    let network = shell();
    let mut worker = run_generation("v1", temp.path(), Arc::clone(&network)).await;

    network.remove("/index.html");
    let calls = network.calls();
    let outcome = worker
        .dispatch(WorkerEvent::Fetch {
            request: AssetRequest::get("/index.html"),
        })
        .await
        .expect("fetch");

    let EventOutcome::Response { response } = outcome else {
        panic!("expected a response");
    };
    assert_eq!(response.expect("cached").body.as_ref(), b"index");
    assert_eq!(network.calls(), calls);
}

#[tokio::test]
async fn uncached_miss_with_no_network_produces_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut worker = run_generation("v1", temp.path(), shell()).await;

    let outcome = worker
        .dispatch(WorkerEvent::Fetch {
            request: AssetRequest::get("/missing.css"),
        })
        .await
        .expect("fetch");
    assert_eq!(outcome, EventOutcome::Response { response: None });
}

#[tokio::test]
async fn failed_upgrade_is_retried_after_redundancy() {
    let temp = tempfile::tempdir().expect("tempdir");
    let network = shell();
    run_generation("v1", temp.path(), Arc::clone(&network)).await;

    network.remove("/manifest.json");
    let (host, _effects) = ChannelHost::new();
    let mut upgrade =
        WorkerDispatcher::with_network(&config("v2", temp.path()), network.clone(), Arc::new(host))
            .await
            .expect("dispatcher");
    assert!(upgrade.dispatch(WorkerEvent::Install).await.is_err());
    assert_eq!(upgrade.state(), WorkerState::Redundant);

    network.insert(upkeep_cache::CachedResponse::new("/manifest.json", 200, "{}"));
    upgrade.dispatch(WorkerEvent::Install).await.expect("retry install");
    upgrade.dispatch(WorkerEvent::Activate).await.expect("activate");

    let storage = FilesystemStorage::new(temp.path()).await.expect("storage");
    assert_eq!(storage.keys().await.expect("keys"), vec!["v2"]);
}

#[tokio::test]
async fn periodic_check_skips_tasks_already_past() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (host, mut effects) = ChannelHost::new();
    let host = Arc::new(host);
    host.client_opened(ClientInfo::new("page-1", "/"));

    let mut worker = WorkerDispatcher::with_network(
        &config("v1", temp.path()),
        shell(),
        Arc::clone(&host) as Arc<dyn upkeep::worker::WorkerHost>,
    )
    .await
    .expect("dispatcher");

    // Scheduled far in the past: never due, whatever the wall clock says.
    let outcome = worker
        .dispatch(WorkerEvent::Message {
            data: json!({
                "type": "SYNC_SCHEDULES",
                "schedules": [
                    {"id": 5, "machine": "Boiler", "type": "Inspect", "date": "2001-01-01", "time": "08:00"}
                ]
            }),
        })
        .await
        .expect("sync");
    assert_eq!(outcome, EventOutcome::ScheduleSynced { tasks: 1 });

    let outcome = worker
        .dispatch(WorkerEvent::PeriodicSync {
            tag: "check-tasks".into(),
        })
        .await
        .expect("check");
    let EventOutcome::DueChecked { report } = outcome else {
        panic!("expected a due check");
    };
    assert_eq!(report.checked, 1);
    assert!(report.notified.is_empty());
    assert!(effects.try_recv().is_err());
}
