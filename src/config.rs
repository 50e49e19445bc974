// Configuration model.
//
// Loading from file/environment is out of scope: this module only defines
// the shape and the validation rule. Construction is the caller's
// (CLI/tests') job; everything downstream assumes a `Config` that already
// passed `validate`.

use crate::{
    error::{ErrorKind, ServiceError},
    util::duration_flex::DurationFlex,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

fn secs(v: f64) -> DurationFlex {
    DurationFlex(Duration::from_secs_f64(v))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub websocket_path: String,
    pub read_timeout: DurationFlex,
    pub write_timeout: DurationFlex,
    pub ping_interval: DurationFlex,
    pub pong_wait: DurationFlex,
    pub max_message_size: usize,
    pub max_connections: usize,
    pub max_in_flight_per_client: usize,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8002,
            websocket_path: "/ws".to_owned(),
            read_timeout: secs(10.0),
            write_timeout: secs(10.0),
            ping_interval: secs(30.0),
            pong_wait: secs(10.0),
            max_message_size: 1024 * 1024,
            max_connections: 256,
            max_in_flight_per_client: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaMtxConfig {
    pub base_url: String,
    pub api_port: u16,
    pub timeout: DurationFlex,
    pub retry_attempts: u32,
    pub retry_base_delay: DurationFlex,
    pub retry_jitter_min: f64,
    pub retry_jitter_max: f64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: DurationFlex,
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout: DurationFlex,
    pub circuit_recovery_confirmation_threshold: u32,
    pub circuit_max_backoff: DurationFlex,
}
impl Default for MediaMtxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1".to_owned(),
            api_port: 9997,
            timeout: secs(30.0),
            retry_attempts: 3,
            retry_base_delay: secs(1.0),
            retry_jitter_min: 0.1,
            retry_jitter_max: 0.5,
            pool_max_idle_per_host: 8,
            pool_idle_timeout: secs(90.0),
            circuit_failure_threshold: 5,
            circuit_recovery_timeout: secs(30.0),
            circuit_recovery_confirmation_threshold: 2,
            circuit_max_backoff: secs(300.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_range: std::ops::Range<u32>,
    pub poll_interval: DurationFlex,
    pub probe_timeout: DurationFlex,
    pub probe_retries: u32,
    pub probe_retry_interval: DurationFlex,
    pub persistent_failure_threshold: u32,
    pub capability_command: String,
}
impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_range: 0..10,
            poll_interval: secs(2.0),
            probe_timeout: secs(3.0),
            probe_retries: 2,
            probe_retry_interval: secs(1.0),
            persistent_failure_threshold: 5,
            capability_command: "/usr/bin/v4l2-ctl".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub tracing: bool,
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            tracing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub path: PathBuf,
    pub use_subdirs: bool,
    pub format: String,
    pub codec: String,
    pub quality: String,
    pub segment_size: u64,
    pub max_duration: DurationFlex,
}
impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/camera-orchestrator/recordings"),
            use_subdirs: true,
            format: "mp4".to_owned(),
            codec: "h264".to_owned(),
            quality: "medium".to_owned(),
            segment_size: 512 * 1024 * 1024,
            max_duration: secs(3600.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotsConfig {
    pub path: PathBuf,
    pub use_subdirs: bool,
    pub format: String,
    pub quality: u8,
    pub tier1_timeout: DurationFlex,
    pub tier2_timeout: DurationFlex,
    pub tier3_timeout: DurationFlex,
    pub trigger_timeout: DurationFlex,
    pub total_timeout: DurationFlex,
    pub latency_immediate: DurationFlex,
    pub latency_acceptable: DurationFlex,
    pub latency_slow: DurationFlex,
}
impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/camera-orchestrator/snapshots"),
            use_subdirs: true,
            format: "jpeg".to_owned(),
            quality: 85,
            tier1_timeout: secs(1.0),
            tier2_timeout: secs(2.0),
            tier3_timeout: secs(3.0),
            trigger_timeout: secs(1.5),
            total_timeout: secs(10.0),
            latency_immediate: secs(0.5),
            latency_acceptable: secs(2.0),
            latency_slow: secs(5.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary_path: PathBuf,
    pub extra_args: Vec<String>,
}
impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("/usr/bin/ffmpeg"),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_concurrent_probes: usize,
    pub max_outbound_event_queue: usize,
}
impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 4,
            max_outbound_event_queue: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl: DurationFlex,
    pub rate_limit_requests: usize,
    pub rate_limit_window: DurationFlex,
    pub rate_limit_inactive_ttl: DurationFlex,
    pub permissions: HashMap<String, String>,
}
impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl: secs(3600.0),
            rate_limit_requests: 100,
            rate_limit_window: secs(60.0),
            rate_limit_inactive_ttl: secs(600.0),
            permissions: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub min_free_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicyConfig {
    pub max_age: DurationFlex,
    pub max_count_per_device: usize,
    pub sweep_interval: DurationFlex,
}
impl Default for RetentionPolicyConfig {
    fn default() -> Self {
        Self {
            max_age: secs(7.0 * 24.0 * 3600.0),
            max_count_per_device: 100,
            sweep_interval: secs(3600.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpHealthConfig {
    pub host: String,
    pub port: u16,
}
impl Default for HttpHealthConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8003,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub mediamtx: MediaMtxConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
    pub recording: RecordingConfig,
    pub snapshots: SnapshotsConfig,
    pub ffmpeg: FfmpegConfig,
    pub notifications: NotificationsConfig,
    pub performance: PerformanceConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub retention_policy: RetentionPolicyConfig,
    pub http_health: HttpHealthConfig,
}
impl Config {
    /// Rejects configurations missing a base URL, with a non-positive
    /// port, with empty recordings/snapshots paths, or with non-positive
    /// retry attempts/timeouts.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut problems = Vec::new();

        if self.mediamtx.base_url.trim().is_empty() {
            problems.push("mediamtx.base_url must not be empty".to_owned());
        }
        if self.mediamtx.api_port == 0 {
            problems.push("mediamtx.api_port must be > 0".to_owned());
        }
        if self.server.port == 0 {
            problems.push("server.port must be > 0".to_owned());
        }
        if self.mediamtx.retry_attempts == 0 {
            problems.push("mediamtx.retry_attempts must be > 0".to_owned());
        }
        if self.mediamtx.timeout.0.is_zero() {
            problems.push("mediamtx.timeout must be > 0".to_owned());
        }
        if self.recording.path.as_os_str().is_empty() {
            problems.push("recording.path must not be empty".to_owned());
        }
        if self.snapshots.path.as_os_str().is_empty() {
            problems.push("snapshots.path must not be empty".to_owned());
        }
        if self.camera.device_range.is_empty() {
            problems.push("camera.device_range must not be empty".to_owned());
        }
        if self.camera.probe_timeout.0.is_zero() {
            problems.push("camera.probe_timeout must be > 0".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::new(
                ErrorKind::ConfigInvalid,
                anyhow::anyhow!(problems.join("; ")),
            ))
        }
    }
}

#[cfg(test)]
mod test_config {
    use super::Config;

    #[test]
    fn default_config_is_valid() {
        let mut config = Config::default();
        config.mediamtx.base_url = "http://127.0.0.1".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let mut config = Config::default();
        config.mediamtx.base_url = String::new();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("base_url"));
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_recordings_path_is_rejected() {
        let mut config = Config::default();
        config.recording.path = std::path::PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_retry_attempts_is_rejected() {
        let mut config = Config::default();
        config.mediamtx.retry_attempts = 0;
        assert!(config.validate().is_err());
    }
}
