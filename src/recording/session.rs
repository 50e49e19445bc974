// RecordingSession.
//
// `RecordingOptions` is a closed, typed field set with `deny_unknown_fields`
// so an unknown option name is a parse error rather than a silently ignored
// key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Mp4,
    Mkv,
    Avi,
}
impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    H264,
    H265,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Recognized option set for starting an advanced recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RecordingOptions {
    pub format: Format,
    pub codec: Codec,
    pub quality: Quality,
    /// seconds; 0 = unlimited.
    pub duration: u64,
    /// bytes.
    pub segment_size: u64,
    pub auto_rotate: bool,
}
impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            format: Format::Mp4,
            codec: Codec::H264,
            quality: Quality::Medium,
            duration: 0,
            segment_size: 512 * 1024 * 1024,
            auto_rotate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Starting,
    Recording,
    Stopping,
    Stopped,
    Error,
}
impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);
impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Display for SessionId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: SessionId,
    pub device_id: crate::camera::Id,
    pub stream_name: String,
    pub started_at: DateTime<Utc>,
    pub status: Status,
    pub current_file: PathBuf,
    /// Files this session rotated away from, oldest first. A predecessor
    /// stays here (and therefore protected from retention) for as long as
    /// the session itself is still `Recording`.
    pub previous_files: Vec<PathBuf>,
    pub rotation_count: u32,
    pub options: RecordingOptions,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod test_session {
    use super::RecordingOptions;

    #[test]
    fn rejects_unknown_option() {
        let result: Result<RecordingOptions, _> =
            serde_json::from_str(r#"{"format":"mp4","bogus":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_partial_options_with_defaults() {
        let options: RecordingOptions = serde_json::from_str(r#"{"quality":"high"}"#).unwrap();
        assert_eq!(options.duration, 0);
    }
}
