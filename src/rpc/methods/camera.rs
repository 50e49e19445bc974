// Camera discovery methods.

use super::{parse_device_id, parse_params};
use crate::{
    camera::Id,
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

pub fn get_camera_list(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let cameras: Vec<_> = state.monitor.get_connected_cameras().into_values().collect();
        Ok(json!({ "cameras": cameras }))
    })
}

#[derive(Deserialize)]
struct DeviceParams {
    device: String,
}

pub fn get_camera_status(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: DeviceParams = parse_params(params)?;
        let id = parse_device_id(&params.device)?;
        let device = state.monitor.get_camera_by_id(id).ok_or_else(|| ServiceError::from_kind(ErrorKind::DeviceUnknown))?;
        Ok(serde_json::to_value(device).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

pub fn get_camera_capabilities(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: DeviceParams = parse_params(params)?;
        let id = parse_device_id(&params.device)?;
        let device = state.monitor.get_camera_by_id(id).ok_or_else(|| ServiceError::from_kind(ErrorKind::DeviceUnknown))?;
        Ok(json!({ "capabilities": device.capabilities }))
    })
}
