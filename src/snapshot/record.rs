// SnapshotRecord. Immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Jpeg,
    Png,
    Bmp,
}
impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    UsbDirect,
    RtspReady,
    Activation,
}

/// Where the observed wall-clock duration lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyBucket {
    Immediate,
    Acceptable,
    Slow,
    Timeout,
}

/// Recognized option set for starting an advanced snapshot capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SnapshotOptions {
    pub format: Format,
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}
impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            format: Format::Jpeg,
            quality: 85,
            max_width: None,
            max_height: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: uuid::Uuid,
    pub device_id: crate::camera::Id,
    pub format: Format,
    pub quality: u8,
    pub output_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub tier: Tier,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub latency_bucket: LatencyBucket,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
