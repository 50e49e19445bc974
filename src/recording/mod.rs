// Recording management.

pub mod manager;
pub mod paths;
pub mod session;

pub use manager::{DeviceLookup, RecordingEngine, RecordingManager};
pub use session::{Codec, Format, Quality, RecordingOptions, RecordingSession, SessionId, Status};
