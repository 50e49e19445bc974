// HealthApi.
//
// Plain Rust aggregation with no HTTP dependency of its own; a `GET
// /health*` surface, if one is added, is a thin wrapper delegating here.

use crate::{
    camera::{Monitor, MonitorStats},
    mediamtx::{CircuitState, Controller},
    recording::RecordingManager,
    snapshot::SnapshotManager,
};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: OverallStatus,
    pub uptime_secs: u64,
    pub ready: bool,
    pub alive: bool,
    pub engine_circuit: CircuitState,
    pub monitor: MonitorStats,
    pub active_recordings: usize,
}

pub struct HealthApi {
    started_at: Instant,
    monitor: Arc<Monitor>,
    controller: Arc<Controller>,
    recording: Arc<RecordingManager>,
    snapshot: Arc<SnapshotManager>,
}
impl HealthApi {
    pub fn new(
        monitor: Arc<Monitor>,
        controller: Arc<Controller>,
        recording: Arc<RecordingManager>,
        snapshot: Arc<SnapshotManager>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            monitor,
            controller,
            recording,
            snapshot,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_ready(&self) -> bool {
        self.controller.is_ready()
    }

    /// The process is alive iff it can still answer this call; there is no
    /// deeper liveness check than that (`GET /health/live`).
    pub fn is_alive(&self) -> bool {
        true
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let monitor_stats = self.monitor.get_monitor_stats();
        // background/non-request-scoped call: nothing to cancel against.
        let engine_health = self.controller.get_health(&CancellationToken::new()).await;
        let active_recordings = self.recording.get_active_recordings().len();

        let status = if !engine_health.reachable {
            OverallStatus::Unhealthy
        } else if engine_health.circuit != CircuitState::Closed || !self.is_ready() {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        };

        let _ = &self.snapshot; // snapshot manager counts folded in via list_snapshots, not health, today.

        HealthSnapshot {
            status,
            uptime_secs: self.uptime().as_secs(),
            ready: self.is_ready(),
            alive: self.is_alive(),
            engine_circuit: engine_health.circuit,
            monitor: monitor_stats,
            active_recordings,
        }
    }
}

#[cfg(test)]
mod test_health {
    use super::*;
    use crate::{
        camera::probe::CapabilityProbe, config::CameraConfig, mediamtx::Controller as MediamtxController,
    };
    use async_trait::async_trait;

    struct NeverProbes;
    #[async_trait]
    impl CapabilityProbe for NeverProbes {
        async fn node_exists(
            &self,
            _path: &std::path::Path,
        ) -> bool {
            false
        }
        async fn probe(
            &self,
            _path: &std::path::Path,
            _timeout: std::time::Duration,
        ) -> Result<crate::camera::V4L2Capabilities, crate::error::ServiceError> {
            Err(crate::error::ServiceError::from_kind(crate::error::ErrorKind::Timeout))
        }
    }

    struct StubEngine;
    #[async_trait]
    impl crate::recording::RecordingEngine for StubEngine {
        async fn ensure_path(
            &self,
            _name: &str,
            _source: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), crate::error::ServiceError> {
            Ok(())
        }
        async fn configure_recording(
            &self,
            _name: &str,
            _record_dir: &std::path::Path,
            _format: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), crate::error::ServiceError> {
            Ok(())
        }
    }
    struct StubDevices;
    impl crate::recording::DeviceLookup for StubDevices {
        fn get_camera(
            &self,
            _id: crate::camera::Id,
        ) -> Option<crate::camera::CameraDevice> {
            None
        }
    }
    struct StubSnapshotEngine;
    #[async_trait]
    impl crate::snapshot::SnapshotEngine for StubSnapshotEngine {
        async fn path_state(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<crate::snapshot::PathState, crate::error::ServiceError> {
            Ok(crate::snapshot::PathState::Missing)
        }
        async fn trigger_activation(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), crate::error::ServiceError> {
            Ok(())
        }
        async fn capture_frame(
            &self,
            _name: &str,
            _options: &crate::snapshot::SnapshotOptions,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, crate::error::ServiceError> {
            Ok(Vec::new())
        }
    }
    struct StubSnapshotDevices;
    impl crate::snapshot::DeviceNodeLookup for StubSnapshotDevices {
        fn device_node(
            &self,
            _id: crate::camera::Id,
        ) -> Option<std::path::PathBuf> {
            None
        }
    }

    #[tokio::test]
    async fn unreachable_engine_is_unhealthy() {
        let monitor = Arc::new(Monitor::new(
            CameraConfig { device_range: 0..0, ..Default::default() },
            Arc::new(NeverProbes),
            None,
        ));
        let readiness = monitor.subscribe_to_readiness();
        let controller = Arc::new(
            MediamtxController::new(
                &crate::config::MediaMtxConfig {
                    base_url: "http://127.0.0.1".to_owned(),
                    api_port: 1, // nothing listens here.
                    retry_attempts: 1,
                    ..Default::default()
                },
                readiness,
            )
            .unwrap(),
        );

        let recording = Arc::new(RecordingManager::new(
            Default::default(),
            Arc::new(StubEngine),
            Arc::new(StubDevices),
            None,
        ));
        let snapshot = Arc::new(SnapshotManager::new(
            Default::default(),
            "/bin/true".into(),
            Arc::new(StubSnapshotEngine),
            Arc::new(StubSnapshotDevices),
            None,
        ));

        let api = HealthApi::new(monitor, controller, recording, snapshot);
        let snapshot = api.snapshot().await;
        assert_eq!(snapshot.status, OverallStatus::Unhealthy);
        assert!(!snapshot.ready);
    }
}
