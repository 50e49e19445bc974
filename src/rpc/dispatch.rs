// Method registry and middleware chain.
//
// Every dispatch first traverses authentication middleware, then RBAC,
// then rate-limit, then the handler: a plain function pipeline, not a
// trait-object stack.

use super::{
    connection::Connection,
    methods::{admin, camera, recording, snapshot, streaming, subscriptions, system},
    protocol::{self, ErrorObject, Request, Response},
    registry::ConnectionRegistry,
};
use crate::{
    auth::{ClientRateLimiter, PermissionMatrix, TokenService},
    camera::Monitor,
    config::{Config, RetentionPolicyConfig},
    events::Bus,
    health::HealthApi,
    mediamtx::Controller,
    recording::RecordingManager,
    snapshot::SnapshotManager,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{future::Future, pin::Pin, sync::Arc};
use tokio_util::sync::CancellationToken;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, crate::error::ServiceError>> + Send>>;
pub type Handler = fn(Arc<AppState>, Arc<Connection>, Value, CancellationToken) -> HandlerFuture;

/// Methods callable before authentication (the only methods callable while
/// unauthenticated are `authenticate` and `ping`).
const PUBLIC_METHODS: &[&str] = &["ping", "authenticate"];

pub struct AppState {
    pub config: Arc<Config>,
    pub monitor: Arc<Monitor>,
    pub controller: Arc<Controller>,
    pub recording: Arc<RecordingManager>,
    pub snapshot: Arc<SnapshotManager>,
    pub bus: Arc<Bus>,
    pub tokens: Arc<TokenService>,
    pub permissions: Arc<PermissionMatrix>,
    pub rate_limiter: Arc<ClientRateLimiter>,
    pub health: Arc<HealthApi>,
    pub connections: Arc<ConnectionRegistry>,
    /// Runtime-overridable copy of `config.retention_policy` (see
    /// `set_retention_policy`); the static config value is only the initial
    /// seed.
    pub retention_policy: Mutex<RetentionPolicyConfig>,
}

pub struct Registry {
    handlers: std::collections::HashMap<&'static str, Handler>,
}
impl Registry {
    pub fn new() -> Self {
        let mut handlers: std::collections::HashMap<&'static str, Handler> = std::collections::HashMap::new();

        handlers.insert("ping", system::ping);
        handlers.insert("authenticate", system::authenticate);
        handlers.insert("get_system_status", system::get_system_status);
        handlers.insert("get_metrics", system::get_metrics);
        handlers.insert("get_status", system::get_status);
        handlers.insert("get_server_info", system::get_server_info);

        handlers.insert("get_camera_list", camera::get_camera_list);
        handlers.insert("get_camera_status", camera::get_camera_status);
        handlers.insert("get_camera_capabilities", camera::get_camera_capabilities);

        handlers.insert("start_recording", recording::start_recording);
        handlers.insert("stop_recording", recording::stop_recording);
        handlers.insert("list_recordings", recording::list_recordings);
        handlers.insert("delete_recording", recording::delete_recording);

        handlers.insert("take_snapshot", snapshot::take_snapshot);
        handlers.insert("list_snapshots", snapshot::list_snapshots);
        handlers.insert("delete_snapshot", snapshot::delete_snapshot);

        handlers.insert("start_streaming", streaming::start_streaming);
        handlers.insert("stop_streaming", streaming::stop_streaming);
        handlers.insert("add_external_stream", streaming::add_external_stream);
        handlers.insert("remove_external_stream", streaming::remove_external_stream);

        handlers.insert("subscribe_events", subscriptions::subscribe_events);
        handlers.insert("unsubscribe_events", subscriptions::unsubscribe_events);
        handlers.insert("get_subscription_stats", subscriptions::get_subscription_stats);

        handlers.insert("get_storage_info", admin::get_storage_info);
        handlers.insert("set_retention_policy", admin::set_retention_policy);
        handlers.insert("cleanup_old_files", admin::cleanup_old_files);

        Self { handlers }
    }

    pub fn get(
        &self,
        method: &str,
    ) -> Option<Handler> {
        self.handlers.get(method).copied()
    }
}
impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `None` for a notification (no `id`): nothing is ever written
/// back to the socket for those.
pub async fn dispatch(
    state: &Arc<AppState>,
    registry: &Registry,
    connection: &Arc<Connection>,
    raw: &str,
) -> Option<Response> {
    let request: Request = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(error) => {
            return Some(Response::failure(
                Value::Null,
                ErrorObject::new(protocol::PARSE_ERROR, error.to_string()),
            ))
        }
    };
    let id = request.id.clone();

    let result = dispatch_checked(state, registry, connection, &request).await;

    id.map(|id| match result {
        Ok(value) => Response::success(id, value),
        Err(error) => Response::failure(id, error),
    })
}

async fn dispatch_checked(
    state: &Arc<AppState>,
    registry: &Registry,
    connection: &Arc<Connection>,
    request: &Request,
) -> Result<Value, ErrorObject> {
    // authentication middleware — runs before the method is even looked up,
    // so an unauthenticated client probing an unregistered method name
    // still gets AUTH_REQUIRED rather than a registry-membership oracle.
    if !PUBLIC_METHODS.contains(&request.method.as_str()) && !connection.is_authenticated() {
        return Err(ErrorObject::new(protocol::AUTH_REQUIRED, "authentication required"));
    }

    let handler = registry
        .get(request.method.as_str())
        .ok_or_else(|| ErrorObject::new(protocol::METHOD_NOT_FOUND, format!("unknown method {:?}", request.method)))?;

    // RBAC middleware.
    if let Some(required) = state.permissions.required_role(request.method.as_str()) {
        if let Some(auth) = connection.auth() {
            if !auth.role.satisfies(required) {
                return Err(ErrorObject::new(protocol::PERMISSION_DENIED, "permission denied"));
            }
        }
        // methods with no auth context here are the PUBLIC_METHODS, which
        // carry no role requirement worth enforcing before authenticate.
    }

    // rate-limit middleware.
    if !state.rate_limiter.admit(connection.id) {
        return Err(ErrorObject::new(protocol::RATE_LIMITED, "rate limit exceeded"));
    }

    handler(Arc::clone(state), Arc::clone(connection), request.params.clone(), connection.cancellation_token())
        .await
        .map_err(|error| protocol::error_object_for(&error))
}
