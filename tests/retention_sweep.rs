// Scenario: an admin tightens the retention policy over the wire, then
// triggers a sweep; 10 files across two synthetic ages with max_age=1h
// and max_count=5 leave exactly the 5 newest behind, in both the
// recordings and the snapshots directories.

mod common;

use camera_orchestrator::{auth::Role, config::Config};
use serde_json::json;
use std::{sync::Arc, time::Duration};

fn write_aged(
    path: &std::path::Path,
    modified: std::time::SystemTime,
) {
    std::fs::write(path, b"data").unwrap();
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_times(std::fs::FileTimes::new().set_modified(modified)).unwrap();
}

fn seed_directory(dir: &std::path::Path) -> (Vec<std::path::PathBuf>, Vec<std::path::PathBuf>) {
    std::fs::create_dir_all(dir).unwrap();
    let now = std::time::SystemTime::now();

    let mut old_paths = Vec::new();
    for i in 0..5 {
        let path = dir.join(format!("old-{i}.bin"));
        write_aged(&path, now - Duration::from_secs(2 * 3600) - Duration::from_secs(i as u64));
        old_paths.push(path);
    }
    let mut new_paths = Vec::new();
    for i in 0..5 {
        let path = dir.join(format!("new-{i}.bin"));
        write_aged(&path, now - Duration::from_secs(60 + i as u64));
        new_paths.push(path);
    }
    (old_paths, new_paths)
}

#[tokio::test(flavor = "multi_thread")]
async fn cleanup_old_files_honors_a_runtime_tightened_policy() {
    let recordings_dir = std::env::temp_dir().join(format!("camera-orchestrator-retention-rec-{}", uuid::Uuid::new_v4()));
    let snapshots_dir = std::env::temp_dir().join(format!("camera-orchestrator-retention-snap-{}", uuid::Uuid::new_v4()));
    let (rec_old, rec_new) = seed_directory(&recordings_dir);
    let (snap_old, snap_new) = seed_directory(&snapshots_dir);

    let mut config = Config::default();
    config.mediamtx.base_url = "http://127.0.0.1".to_owned();
    config.mediamtx.api_port = 1;
    config.recording.path = recordings_dir.clone();
    config.snapshots.path = snapshots_dir.clone();
    // the compiled-in default is far looser than the scenario; the admin
    // tightens it over the wire before sweeping.
    config.retention_policy.max_age = Duration::from_secs(24 * 3600).into();
    config.retention_policy.max_count_per_device = 1000;

    let probe = Arc::new(common::StubProbe::new(&[]));
    let harness = common::spawn(config, probe).await;

    let mut client = harness.connect().await;
    let token = harness.state.tokens.issue("admin-1", Role::Admin).unwrap();
    client.authenticate(&token).await;

    let policy = client
        .call("set_retention_policy", json!({ "max_age_secs": 3600.0, "max_count_per_device": 5 }))
        .await;
    assert!(policy.get("error").is_none(), "unexpected error: {policy:?}");

    let response = client.call("cleanup_old_files", json!({})).await;
    assert!(response.get("error").is_none(), "unexpected error: {response:?}");
    assert_eq!(response["result"]["recordings_removed"], json!(5));
    assert_eq!(response["result"]["snapshots_removed"], json!(5));

    for path in rec_old.iter().chain(snap_old.iter()) {
        assert!(!path.exists(), "stale file {} should have been swept", path.display());
    }
    for path in rec_new.iter().chain(snap_new.iter()) {
        assert!(path.exists(), "recent file {} should have survived the sweep", path.display());
    }

    harness.shutdown().await;
    let _ = std::fs::remove_dir_all(&recordings_dir);
    let _ = std::fs::remove_dir_all(&snapshots_dir);
}
