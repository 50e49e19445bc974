// Storage/retention administration methods, admin-only.

use super::parse_params;
use crate::{
    config::RetentionPolicyConfig,
    error::{ErrorKind, ServiceError},
    rpc::{
        connection::Connection,
        dispatch::{AppState, HandlerFuture},
    },
    util::duration_flex::DurationFlex,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn disk_usage(path: &std::path::Path) -> Option<(u64, u64)> {
    // statvfs-style free/total space; not exposed by std, so this degrades
    // to "unknown" rather than shelling out.
    let _ = tokio::fs::metadata(path).await.ok()?;
    None
}

pub fn get_storage_info(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let recordings_path = state.config.recording.path.clone();
        let snapshots_path = state.config.snapshots.path.clone();
        let recordings_usage = disk_usage(&recordings_path).await;
        let snapshots_usage = disk_usage(&snapshots_path).await;

        Ok(json!({
            "recordings_path": recordings_path,
            "snapshots_path": snapshots_path,
            "recordings_usage_known": recordings_usage.is_some(),
            "snapshots_usage_known": snapshots_usage.is_some(),
            "min_free_bytes": state.config.storage.min_free_bytes,
        }))
    })
}

#[derive(Deserialize)]
#[serde(default)]
struct SetRetentionPolicyParams {
    max_age_secs: Option<f64>,
    max_count_per_device: Option<usize>,
}
impl Default for SetRetentionPolicyParams {
    fn default() -> Self {
        Self { max_age_secs: None, max_count_per_device: None }
    }
}

pub fn set_retention_policy(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: SetRetentionPolicyParams = parse_params(params)?;
        let mut policy = state.retention_policy.lock();
        if let Some(max_age_secs) = params.max_age_secs {
            if max_age_secs <= 0.0 {
                return Err(ServiceError::from_kind(ErrorKind::InvalidOption));
            }
            policy.max_age = DurationFlex(std::time::Duration::from_secs_f64(max_age_secs));
        }
        if let Some(max_count_per_device) = params.max_count_per_device {
            policy.max_count_per_device = max_count_per_device;
        }
        Ok(retention_policy_json(&policy))
    })
}

fn retention_policy_json(policy: &RetentionPolicyConfig) -> Value {
    json!({
        "max_age_secs": std::time::Duration::from(policy.max_age).as_secs_f64(),
        "max_count_per_device": policy.max_count_per_device,
    })
}

pub fn cleanup_old_files(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let (max_age, max_count) = {
            let policy = state.retention_policy.lock();
            (std::time::Duration::from(policy.max_age), policy.max_count_per_device)
        };

        let recordings_removed = state.recording.cleanup_old_recordings(max_age, max_count).await?;
        let snapshots_removed = state.snapshot.cleanup_old_snapshots(max_age, max_count).await?;

        Ok(json!({
            "recordings_removed": recordings_removed,
            "snapshots_removed": snapshots_removed,
        }))
    })
}
