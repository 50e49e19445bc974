// JSON-RPC 2.0 wire frames.
//
// One request or notification per WebSocket text frame; batching is not
// required. `ErrorObject` carries the minimum application error range.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AUTH_REQUIRED: i64 = -32001;
pub const PERMISSION_DENIED: i64 = -32002;
pub const RATE_LIMITED: i64 = -32003;
pub const INVALID_DEVICE: i64 = -32010;
pub const DEVICE_BUSY: i64 = -32011;
pub const ENGINE_UNAVAILABLE: i64 = -32020;
pub const NOT_FOUND: i64 = -32030;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent on a notification (no id, no response expected).
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
impl ErrorObject {
    pub fn new(
        code: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
    pub fn with_data(
        mut self,
        data: Value,
    ) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    pub id: Value,
}
impl Response {
    pub fn success(
        id: Value,
        result: Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }
    pub fn failure(
        id: Value,
        error: ErrorObject,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Maps a `ServiceError` to the minimum application error range. Kinds
/// with no dedicated wire code fall back to `internal` / -32603.
pub fn error_object_for(error: &crate::error::ServiceError) -> ErrorObject {
    use crate::error::ErrorKind;

    let code = match error.kind {
        ErrorKind::AuthRequired => AUTH_REQUIRED,
        ErrorKind::AuthInvalid => AUTH_REQUIRED,
        ErrorKind::PermissionDenied => PERMISSION_DENIED,
        ErrorKind::RateLimited => RATE_LIMITED,
        ErrorKind::DeviceUnknown => INVALID_DEVICE,
        ErrorKind::DeviceBusy => DEVICE_BUSY,
        ErrorKind::DeviceUnavailable => INVALID_DEVICE,
        ErrorKind::EngineUnavailable => ENGINE_UNAVAILABLE,
        ErrorKind::CircuitOpen => ENGINE_UNAVAILABLE,
        ErrorKind::NotFound | ErrorKind::SessionNotFound => NOT_FOUND,
        ErrorKind::InvalidOption => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    };
    ErrorObject::new(code, error.kind.to_string())
}

#[cfg(test)]
mod test_protocol {
    use super::*;
    use crate::error::{ErrorKind, ServiceError};

    #[test]
    fn auth_required_and_permission_denied_are_distinguishable() {
        let auth = error_object_for(&ServiceError::from_kind(ErrorKind::AuthRequired));
        let perm = error_object_for(&ServiceError::from_kind(ErrorKind::PermissionDenied));
        assert_eq!(auth.code, AUTH_REQUIRED);
        assert_eq!(perm.code, PERMISSION_DENIED);
        assert_ne!(auth.code, perm.code);
    }

    #[test]
    fn response_serializes_without_null_error_on_success() {
        let response = Response::success(Value::from(1), serde_json::json!({"ok": true}));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("error").is_none());
    }
}
