use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use berth_app::{EnsurePath, Gateway, spawn_sync_scheduler};
use berth_config::{BerthConfig, LogSettings, RetryConfig, SandboxConfig, StoreConfig};
use berth_sandbox::{ProcessStatus, SupervisedProcess};
use berth_store::{MemoryObjectStore, ObjectStore};
use berth_telemetry::Metrics;
use berth_test_support::fixtures::{CRITICAL_FILE, gateway_config, sync_config};
use berth_test_support::mocks::FakeSandbox;

fn config() -> BerthConfig {
    BerthConfig {
        store: StoreConfig::default(),
        sandbox: SandboxConfig { root: "/".into() },
        sync: sync_config(),
        gateway: gateway_config(),
        retry: RetryConfig::default(),
        logging: LogSettings::default(),
    }
}

fn gateway(
    sandbox: &FakeSandbox,
    store: Option<&MemoryObjectStore>,
    metrics: Option<Metrics>,
) -> Gateway {
    Gateway::from_config(
        Arc::new(sandbox.clone()),
        store.map(|store| Arc::new(store.clone()) as Arc<dyn ObjectStore>),
        &config(),
        metrics,
    )
}

fn running_gateway(sandbox: &FakeSandbox) -> Result<()> {
    let mut process = SupervisedProcess::starting("proc-1", "/usr/local/bin/start-gateway.sh");
    process.transition(ProcessStatus::Running)?;
    sandbox.add_process(process);
    Ok(())
}

#[tokio::test]
async fn concurrent_ensures_spawn_one_gateway() -> Result<()> {
    let sandbox = FakeSandbox::new();
    let gateway = gateway(&sandbox, None, None);

    let (first, second) = tokio::join!(gateway.ensure(), gateway.ensure());
    let (first, second) = (first?, second?);

    assert_eq!(sandbox.calls("spawn"), 1);
    let mut paths = vec![first.path, second.path];
    paths.sort_by_key(|path| path.as_str());
    assert_eq!(paths, vec![EnsurePath::Reused, EnsurePath::Started]);
    assert_eq!(first.process.id, second.process.id);
    Ok(())
}

#[tokio::test]
async fn status_reports_process_marker_and_metrics() -> Result<()> {
    let sandbox = FakeSandbox::new().with_file(CRITICAL_FILE, b"{}".to_vec());
    let store = MemoryObjectStore::new();
    let gateway = gateway(&sandbox, Some(&store), Some(Metrics::new()?));

    let before = gateway.status().await;
    assert!(before.process.is_none());
    assert!(before.last_sync.is_none());
    assert!(before.store_configured);

    gateway.ensure().await?;
    let backup = gateway.backup().await;
    assert!(backup.success);

    let after = gateway.status().await;
    let Some(process) = after.process else {
        bail!("gateway process missing from status");
    };
    assert_eq!(process.status, ProcessStatus::Running);
    assert_eq!(after.last_sync, backup.last_sync);
    let Some(metrics) = after.metrics else {
        bail!("metrics snapshot missing from status");
    };
    assert_eq!(metrics.files_backed_up, 1);
    Ok(())
}

#[tokio::test]
async fn status_without_store_has_no_marker() {
    let sandbox = FakeSandbox::new();
    let status = gateway(&sandbox, None, None).status().await;
    assert!(!status.store_configured);
    assert!(status.last_sync.is_none());
    assert!(status.metrics.is_none());
}

#[tokio::test]
async fn backup_if_running_skips_without_gateway() -> Result<()> {
    let sandbox = FakeSandbox::new().with_file(CRITICAL_FILE, b"{}".to_vec());
    let store = MemoryObjectStore::new();
    let gateway = gateway(&sandbox, Some(&store), None);

    assert!(gateway.backup_if_running().await.is_none());
    assert!(store.keys().is_empty());

    running_gateway(&sandbox)?;
    let Some(result) = gateway.backup_if_running().await else {
        bail!("backup skipped despite a running gateway");
    };
    assert!(result.success);
    assert_eq!(store.keys(), vec![".last-sync", "config/gateway.json"]);
    Ok(())
}

#[tokio::test]
async fn restore_through_facade_writes_sandbox_files() -> Result<()> {
    let store = MemoryObjectStore::new();
    store
        .put("skills/search/SKILL.md", b"# search".to_vec())
        .await?;
    let sandbox = FakeSandbox::new();

    let result = gateway(&sandbox, Some(&store), None).restore().await;

    assert!(result.success);
    assert_eq!(
        sandbox.file("/data/skills/search/SKILL.md"),
        Some(b"# search".to_vec())
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scheduler_backs_up_each_interval_while_running() -> Result<()> {
    let sandbox = FakeSandbox::new().with_file(CRITICAL_FILE, b"{}".to_vec());
    let store = MemoryObjectStore::new();
    let gateway = Arc::new(gateway(&sandbox, Some(&store), None));
    let interval = Duration::from_secs(60);

    let handle = spawn_sync_scheduler(Arc::clone(&gateway), interval);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(store.keys().is_empty());

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(store.keys().is_empty());
    assert_eq!(sandbox.calls("list_files"), 0);

    running_gateway(&sandbox)?;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.keys(), vec![".last-sync", "config/gateway.json"]);

    handle.abort();
    Ok(())
}
