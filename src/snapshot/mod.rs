// Snapshot management.

pub mod manager;
pub mod record;

pub use manager::{DeviceNodeLookup, PathState, SnapshotEngine, SnapshotManager};
pub use record::{Format, LatencyBucket, SnapshotOptions, SnapshotRecord, Tier};
