// Error taxonomy.
//
// Subsystems return `Result<T, ServiceError>`. `ServiceError` pairs a small,
// closed `ErrorKind` (the thing a caller branches on, or the JSON-RPC layer
// maps to a wire code) with an `anyhow::Error` carrying the `.context`
// chain a human reads in the log. Plumbing that nothing ever branches on
// stays plain `anyhow::Error`.

use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("configuration invalid")]
    ConfigInvalid,

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication invalid")]
    AuthInvalid,

    #[error("permission denied")]
    PermissionDenied,

    #[error("rate limited")]
    RateLimited,

    #[error("device unknown")]
    DeviceUnknown,

    #[error("device busy")]
    DeviceBusy,

    #[error("device unavailable")]
    DeviceUnavailable,

    #[error("media engine unavailable")]
    EngineUnavailable,

    #[error("media engine protocol error")]
    EngineProtocol,

    #[error("operation timed out")]
    Timeout,

    #[error("not found")]
    NotFound,

    #[error("invalid option")]
    InvalidOption,

    #[error("session not found")]
    SessionNotFound,

    #[error("session already terminal")]
    SessionTerminal,

    #[error("transport error")]
    Transport,

    #[error("unexpected http status")]
    HttpStatus,

    #[error("circuit open")]
    CircuitOpen,

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error")]
    Internal,
}

#[derive(Debug)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub source: AnyhowError,
}
impl ServiceError {
    pub fn new(
        kind: ErrorKind,
        source: impl Into<AnyhowError>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            source: AnyhowError::msg(kind.to_string()),
        }
    }

    /// Appends a context line to the source chain without changing `kind`.
    /// Used where a caller needs to attach detail (e.g. which tier an
    /// attempt reached) that the kind alone can't carry.
    pub fn with_context(
        mut self,
        context: impl fmt::Display + Send + Sync + 'static,
    ) -> Self {
        self.source = self.source.context(context.to_string());
        self
    }
}
impl fmt::Display for ServiceError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}: {:?}", self.kind, self.source)
    }
}
impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}
impl From<ServiceError> for AnyhowError {
    fn from(value: ServiceError) -> Self {
        value.source.context(value.kind.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Adapts a `Result<T, anyhow::Error>` into a `ServiceResult<T>` by pinning
/// a kind onto it. Mirrors `anyhow::Context`'s `.context` ergonomics.
pub trait ErrorKindExt<T> {
    fn kind(
        self,
        kind: ErrorKind,
    ) -> ServiceResult<T>;
}
impl<T, E> ErrorKindExt<T> for Result<T, E>
where
    E: Into<AnyhowError>,
{
    fn kind(
        self,
        kind: ErrorKind,
    ) -> ServiceResult<T> {
        self.map_err(|error| ServiceError::new(kind, error.into()))
    }
}
