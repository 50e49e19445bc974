// Path/Stream domain model and media-engine wire DTOs.
//
// The wire shapes mirror mediamtx's real `/v3/config/paths/*` and
// `/v3/paths/*` API: a *configured* path (what the engine was told to
// serve) and a *runtime* path (what it is doing right now). `Path` below
// folds both into a single status-bearing view; the split wire DTOs exist
// only to absorb the engine's actual (slightly irregular) response shapes.

use serde::{Deserialize, Serialize};

/// Source as reported by the engine: either a bare URL string or a
/// `{type, url}` object. Path entries may report source either as a plain
/// string or as a nested object with a `type`/`url` shape; both must be
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Url(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        url: String,
    },
}
impl SourceSpec {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Typed { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfDto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: Option<SourceSpec>,
    #[serde(rename = "sourceOnDemand", default)]
    pub source_on_demand: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfListDto {
    #[serde(default)]
    pub item_count: i64,
    #[serde(default)]
    pub page_count: i64,
    #[serde(default)]
    pub items: Vec<PathConfDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRuntimeDto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: Option<SourceSpec>,
    #[serde(default)]
    pub ready: bool,
    #[serde(rename = "readyTime", default)]
    pub ready_time: Option<String>,
    #[serde(rename = "bytesReceived", default)]
    pub bytes_received: u64,
    #[serde(rename = "bytesSent", default)]
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathRuntimeListDto {
    #[serde(default)]
    pub item_count: i64,
    #[serde(default)]
    pub page_count: i64,
    #[serde(default)]
    pub items: Vec<PathRuntimeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfDto {
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// Derived status rule: if a path has an active publisher, READY; else if
/// an on-demand source is configured, ON_DEMAND; else IDLE. Stated
/// explicitly so reporting stays bit-identical across implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Ready,
    OnDemand,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub name: String,
    pub source: Option<String>,
    pub on_demand: bool,
    pub status: StreamStatus,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}
impl Path {
    pub fn derive(
        conf: &PathConfDto,
        runtime: Option<&PathRuntimeDto>,
    ) -> Self {
        let ready = runtime.is_some_and(|runtime| runtime.ready);
        let status = if ready {
            StreamStatus::Ready
        } else if conf.source_on_demand {
            StreamStatus::OnDemand
        } else {
            StreamStatus::Idle
        };

        Self {
            name: conf.name.clone(),
            source: conf.source.as_ref().map(|source| source.url().to_owned()),
            on_demand: conf.source_on_demand,
            status,
            bytes_received: runtime.map(|runtime| runtime.bytes_received).unwrap_or(0),
            bytes_sent: runtime.map(|runtime| runtime.bytes_sent).unwrap_or(0),
        }
    }
}

/// A path whose source is currently active and publishing. Distinct type
/// from `Path` only to mirror the "streams" vs "paths" vocabulary used by
/// the RPC surface — structurally identical.
pub type Stream = Path;
