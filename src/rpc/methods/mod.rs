// Method handlers, one family per file, grouped by the operations they
// expose over the wire.

pub mod admin;
pub mod camera;
pub mod recording;
pub mod snapshot;
pub mod streaming;
pub mod subscriptions;
pub mod system;

use crate::{
    camera::Id,
    error::{ErrorKind, ServiceError},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Device ids travel over the wire as `"camera<N>"` strings, not as the
/// bare integer `Id`'s derived `Deserialize` would accept.
pub(super) fn parse_device_id(raw: &str) -> Result<Id, ServiceError> {
    raw.parse().map_err(|_| ServiceError::from_kind(ErrorKind::DeviceUnknown))
}

/// Every handler's first move: decode `params` into its typed argument
/// struct. An empty object is accepted wherever all fields are optional,
/// since the wire allows `params` to be omitted entirely (`Request::params`
/// defaults to `Value::Null`).
pub(super) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ServiceError> {
    let params = if params.is_null() { Value::Object(Default::default()) } else { params };
    serde_json::from_value(params).map_err(|error| ServiceError::new(ErrorKind::InvalidOption, error))
}
