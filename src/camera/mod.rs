// Camera discovery and capability tracking.

pub mod capabilities;
pub mod device;
pub mod monitor;
pub mod probe;
pub mod stats;

pub use capabilities::V4L2Capabilities;
pub use device::{CameraDevice, Id, Status};
pub use monitor::Monitor;
pub use probe::{CapabilityProbe, CommandCapabilityProbe};
pub use stats::MonitorStats;

use tokio::sync::mpsc;

/// Published on every structurally meaningful state transition. Each
/// variant carries the post-transition snapshot.
#[derive(Debug, Clone)]
pub enum CameraEvent {
    Connected(CameraDevice),
    Disconnected(CameraDevice),
    StatusChanged(CameraDevice),
    Error(CameraDevice),
}

/// Registration object for `AddEventHandler` — invoked inline from the
/// reconciliation loop, so implementations must be cheap and must not block.
/// Errors are the handler's own business to log; a panicking handler would
/// bring down the monitor's task, so keep real logic behind `catch_unwind`
/// if it can fail in surprising ways.
pub trait EventHandler: Send + Sync {
    fn handle(
        &self,
        event: &CameraEvent,
    );
}
impl<F> EventHandler for F
where
    F: Fn(&CameraEvent) + Send + Sync,
{
    fn handle(
        &self,
        event: &CameraEvent,
    ) {
        self(event)
    }
}

/// Listener registered via `AddEventCallback` — non-blocking delivery
/// through a bounded channel. `Blocking` listeners are invoked synchronously
/// from the sweep; `Buffered` listeners get a channel and never see the
/// sweep wait on them (a full channel just drops the event, logged).
pub(crate) enum Listener {
    Blocking(std::sync::Arc<dyn EventHandler>),
    Buffered(mpsc::Sender<CameraEvent>),
}
