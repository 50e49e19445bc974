// Subscription topics, closed set.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    CameraConnected,
    CameraDisconnected,
    CameraStatus,
    RecordingStart,
    RecordingStop,
    RecordingError,
    SnapshotTaken,
    StreamReady,
    SystemStartup,
    SystemShutdown,
}
impl Topic {
    pub const ALL: &'static [Topic] = &[
        Topic::CameraConnected,
        Topic::CameraDisconnected,
        Topic::CameraStatus,
        Topic::RecordingStart,
        Topic::RecordingStop,
        Topic::RecordingError,
        Topic::SnapshotTaken,
        Topic::StreamReady,
        Topic::SystemStartup,
        Topic::SystemShutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CameraConnected => "camera.connected",
            Self::CameraDisconnected => "camera.disconnected",
            Self::CameraStatus => "camera.status",
            Self::RecordingStart => "recording.start",
            Self::RecordingStop => "recording.stop",
            Self::RecordingError => "recording.error",
            Self::SnapshotTaken => "snapshot.taken",
            Self::StreamReady => "stream.ready",
            Self::SystemStartup => "system.startup",
            Self::SystemShutdown => "system.shutdown",
        }
    }
}
impl fmt::Display for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl std::str::FromStr for Topic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown topic {s:?}"))
    }
}
