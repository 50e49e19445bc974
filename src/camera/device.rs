// CameraDevice.
//
// Logical id is `camera<N>`, N the OS device-node index, and stays stable
// across reconnects (the monitor never reassigns it, and never drops the
// table entry — it transitions to Disconnected instead, so in-flight
// sessions referencing the id keep resolving).

use super::capabilities::V4L2Capabilities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(pub u32);
impl Id {
    pub fn from_node_index(index: u32) -> Self {
        Self(index)
    }
}
impl fmt::Display for Id {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "camera{}", self.0)
    }
}
impl std::str::FromStr for Id {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let index = s
            .strip_prefix("camera")
            .ok_or_else(|| anyhow::anyhow!("expected id of the form camera<N>, got {s:?}"))?
            .parse()?;
        Ok(Self(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: Id,
    pub os_path: PathBuf,
    pub name: String,
    pub driver: String,
    pub capabilities: Option<V4L2Capabilities>,
    pub status: Status,
    pub last_seen: DateTime<Utc>,
    pub error_message: Option<String>,
}
impl CameraDevice {
    pub fn new_unprobed(
        id: Id,
        os_path: PathBuf,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            os_path,
            name: String::new(),
            driver: String::new(),
            capabilities: None,
            status: Status::Disconnected,
            last_seen: now,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod test_device {
    use super::Id;
    use std::str::FromStr;

    #[test]
    fn id_roundtrips_through_display_and_parse() {
        let id = Id::from_node_index(3);
        assert_eq!(id.to_string(), "camera3");
        assert_eq!(Id::from_str("camera3").unwrap(), id);
    }

    #[test]
    fn id_parse_rejects_malformed_input() {
        assert!(Id::from_str("cam3").is_err());
        assert!(Id::from_str("camerax").is_err());
    }

    #[test]
    fn id_matches_the_camera_n_naming_pattern() {
        let re = regex::Regex::new(r"^camera[0-9]+$").unwrap();
        assert!(re.is_match(&Id::from_node_index(12).to_string()));
    }
}
