// ping / authenticate / system status family.

use super::parse_params;
use crate::{
    error::{ErrorKind, ServiceError},
    rpc::{
        connection::{AuthContext, Connection},
        dispatch::{AppState, HandlerFuture},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn ping(
    _state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move { Ok(json!("pong")) })
}

#[derive(Deserialize)]
struct AuthenticateParams {
    auth_token: String,
}

/// `authenticate` with a valid token is idempotent: calling it again with
/// the same valid token just re-authenticates to the same role.
pub fn authenticate(
    state: Arc<AppState>,
    connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: AuthenticateParams = parse_params(params)?;
        let claims = state
            .tokens
            .validate(&params.auth_token)
            .map_err(|_| ServiceError::from_kind(ErrorKind::AuthInvalid))?;

        connection.authenticate(AuthContext { user_id: claims.sub, role: claims.role });
        Ok(json!({ "authenticated": true, "role": claims.role }))
    })
}

pub fn get_system_status(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let health = state.health.snapshot().await;
        Ok(json!({
            "status": health.status,
            "available_cameras": health.monitor.known_device_count,
            "ready": health.ready,
            "uptime_secs": health.uptime_secs,
        }))
    })
}

pub fn get_metrics(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let metrics = state.controller.get_metrics(&cancel).await?;
        Ok(serde_json::to_value(metrics).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

pub fn get_status(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let health = state.health.snapshot().await;
        Ok(serde_json::to_value(health).map_err(|error| ServiceError::new(ErrorKind::Internal, error))?)
    })
}

pub fn get_server_info(
    _state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    })
}
