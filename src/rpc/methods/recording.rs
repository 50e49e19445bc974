// Recording control methods.

use super::{parse_device_id, parse_params};
use crate::{
    error::{ErrorKind, ServiceError},
    recording::{RecordingOptions, SessionId},
    rpc::{
        connection::Connection,
        dispatch::{AppState, HandlerFuture},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{path::PathBuf, str::FromStr, sync::Arc};
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
#[serde(default)]
struct StartRecordingParams {
    device: String,
    base_path: Option<PathBuf>,
    options: RecordingOptions,
}
impl Default for StartRecordingParams {
    fn default() -> Self {
        Self { device: String::new(), base_path: None, options: RecordingOptions::default() }
    }
}

pub fn start_recording(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: StartRecordingParams = parse_params(params)?;
        let device_id = parse_device_id(&params.device)?;
        let session = state
            .recording
            .start_advanced_recording(device_id, params.base_path, params.options, &cancel)
            .await?;
        Ok(serde_json::to_value(session).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

#[derive(Deserialize)]
struct SessionParams {
    session_id: String,
}

pub fn stop_recording(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: SessionParams = parse_params(params)?;
        let session_id = parse_session_id(&params.session_id)?;
        let session = state.recording.stop_recording(session_id).await?;
        Ok(serde_json::to_value(session).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

#[derive(Deserialize)]
#[serde(default)]
struct ListRecordingsParams {
    device: Option<String>,
}
impl Default for ListRecordingsParams {
    fn default() -> Self {
        Self { device: None }
    }
}

/// Recordings are files, not a database table: `list_recordings` reports
/// the in-memory session table rather than walking the filesystem, which
/// is what the manager already tracks per active/recently-stopped device.
pub fn list_recordings(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: ListRecordingsParams = parse_params(params)?;
        let sessions = match params.device {
            Some(device) => {
                let device_id = parse_device_id(&device)?;
                state.recording.get_active_recording(device_id).into_iter().collect()
            }
            None => state.recording.get_active_recordings(),
        };
        Ok(json!({ "recordings": sessions }))
    })
}

/// Deletes the recording's current file from disk; the session's own
/// lifecycle (stop/rotate) is untouched — this acts on the artifact, not
/// the session.
pub fn delete_recording(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: SessionParams = parse_params(params)?;
        let session_id = parse_session_id(&params.session_id)?;
        let session = state
            .recording
            .get_recording_status(session_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::SessionNotFound))?;

        match tokio::fs::remove_file(&session.current_file).await {
            Ok(()) => Ok(json!({ "deleted": true })),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::from_kind(ErrorKind::NotFound))
            }
            Err(error) => Err(ServiceError::new(ErrorKind::Internal, error)),
        }
    })
}

fn parse_session_id(raw: &str) -> Result<SessionId, ServiceError> {
    uuid::Uuid::from_str(raw)
        .map(SessionId)
        .map_err(|_| ServiceError::from_kind(ErrorKind::SessionNotFound))
}
