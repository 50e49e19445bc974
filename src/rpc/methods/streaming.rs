// Streaming/path control methods.
//
// `start_streaming`/`stop_streaming` create or tear down the media engine
// path for a known camera; `add_external_stream`/`remove_external_stream`
// do the same for an arbitrary named source that isn't backed by a local
// device (the engine doesn't distinguish the two, only the source string
// differs).

use super::{parse_device_id, parse_params};
use crate::{
    error::{ErrorKind, ServiceError},
    rpc::{
        connection::Connection,
        dispatch::{AppState, HandlerFuture},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
#[serde(default)]
struct StartStreamingParams {
    device: String,
    on_demand: bool,
}
impl Default for StartStreamingParams {
    fn default() -> Self {
        Self { device: String::new(), on_demand: true }
    }
}

pub fn start_streaming(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: StartStreamingParams = parse_params(params)?;
        let device_id = parse_device_id(&params.device)?;
        let device = state
            .monitor
            .get_camera_by_id(device_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::DeviceUnknown))?;
        if device.status != crate::camera::Status::Connected {
            return Err(ServiceError::from_kind(ErrorKind::DeviceUnavailable));
        }

        let name = device_id.to_string();
        let source = format!("rtsp://127.0.0.1/{name}");
        state.controller.create_stream(&name, &source, params.on_demand, &cancel).await?;
        let stream = state.controller.get_stream(&name, &cancel).await?;
        Ok(serde_json::to_value(stream).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

#[derive(Deserialize)]
struct DeviceParams {
    device: String,
}

pub fn stop_streaming(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: DeviceParams = parse_params(params)?;
        let device_id = parse_device_id(&params.device)?;
        state.controller.delete_stream(&device_id.to_string(), &cancel).await?;
        Ok(json!({ "stopped": true }))
    })
}

#[derive(Deserialize)]
struct ExternalStreamParams {
    name: String,
    source: String,
    #[serde(default)]
    on_demand: bool,
}

pub fn add_external_stream(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: ExternalStreamParams = parse_params(params)?;
        state.controller.create_stream(&params.name, &params.source, params.on_demand, &cancel).await?;
        let stream = state.controller.get_stream(&params.name, &cancel).await?;
        Ok(serde_json::to_value(stream).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

#[derive(Deserialize)]
struct NameParams {
    name: String,
}

pub fn remove_external_stream(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: NameParams = parse_params(params)?;
        state.controller.delete_stream(&params.name, &cancel).await?;
        Ok(json!({ "removed": true }))
    })
}
