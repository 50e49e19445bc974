// Snapshot capture methods.

use super::{parse_device_id, parse_params};
use crate::{
    error::{ErrorKind, ServiceError},
    rpc::{
        connection::Connection,
        dispatch::{AppState, HandlerFuture},
    },
    snapshot::SnapshotOptions,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
#[serde(default)]
struct TakeSnapshotParams {
    device: String,
    base_path: Option<PathBuf>,
    options: SnapshotOptions,
}
impl Default for TakeSnapshotParams {
    fn default() -> Self {
        Self { device: String::new(), base_path: None, options: SnapshotOptions::default() }
    }
}

pub fn take_snapshot(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: TakeSnapshotParams = parse_params(params)?;
        let device_id = parse_device_id(&params.device)?;
        let record = state
            .snapshot
            .take_advanced_snapshot(device_id, params.base_path, params.options, &cancel)
            .await?;
        Ok(serde_json::to_value(record).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

#[derive(Deserialize)]
#[serde(default)]
struct ListSnapshotsParams {
    device: Option<String>,
}
impl Default for ListSnapshotsParams {
    fn default() -> Self {
        Self { device: None }
    }
}

/// Snapshots have no session table (one-shot captures, not sessions) —
/// listing means reading the directory back, optionally scoped to a
/// device's subdirectory when `use_subdirs` is in effect.
pub fn list_snapshots(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: ListSnapshotsParams = parse_params(params)?;
        let root = match &params.device {
            Some(device) => {
                let device_id = parse_device_id(device)?;
                let mut dir = state.config.snapshots.path.clone();
                if state.config.snapshots.use_subdirs {
                    dir.push(device_id.to_string());
                }
                dir
            }
            None => state.config.snapshots.path.clone(),
        };

        let mut files = Vec::new();
        match tokio::fs::read_dir(&root).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?
                {
                    if entry.path().is_file() {
                        files.push(entry.path());
                    }
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(ServiceError::new(ErrorKind::Internal, error)),
        }

        Ok(json!({ "snapshots": files }))
    })
}

#[derive(Deserialize)]
struct PathParams {
    path: PathBuf,
}

pub fn delete_snapshot(
    _state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: PathParams = parse_params(params)?;
        match tokio::fs::remove_file(&params.path).await {
            Ok(()) => Ok(json!({ "deleted": true })),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::from_kind(ErrorKind::NotFound))
            }
            Err(error) => Err(ServiceError::new(ErrorKind::Internal, error)),
        }
    })
}
