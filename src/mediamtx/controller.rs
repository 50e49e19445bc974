// Media-engine controller.
//
// Thin domain layer over `Client`: paths, streams, health, metrics,
// config get/update, plus the readiness signal every caller in the
// service try-then-subscribes to. Owns nothing the client doesn't also
// own; the only state here is the cached last-fetched config and the
// readiness latch.
//
// Also the facade the rest of the service goes through for recording and
// snapshot operations: `RecordingManager`/`SnapshotManager` are attached
// post-construction (`attach_recording_manager`/`attach_snapshot_manager`)
// to break the construction cycle, since both managers hold this
// controller as their `RecordingEngine`/`SnapshotEngine`.

use super::{
    circuit_breaker::CircuitState,
    client::Client,
    model::{GlobalConfDto, Path, PathConfDto, PathConfListDto, PathRuntimeDto, PathRuntimeListDto, Stream},
};
use crate::{
    config::MediaMtxConfig,
    error::{ErrorKind, ServiceError},
    events::{Bus, Topic},
    recording::{session::RecordingSession, RecordingManager},
    snapshot::{record::SnapshotRecord, SnapshotManager, SnapshotOptions},
    util::readiness::{Readiness, ReadinessReceiver},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::{path::PathBuf, sync::Arc, sync::OnceLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EngineHealth {
    pub reachable: bool,
    pub circuit: CircuitState,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineMetrics {
    pub path_count: usize,
    pub ready_path_count: usize,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,
    pub circuit: CircuitState,
}

pub struct Controller {
    client: Client,
    config: Mutex<GlobalConfDto>,
    config_fetched: Mutex<bool>,
    readiness: Readiness,
    monitor_readiness: ReadinessReceiver,
    bus: Option<Arc<Bus>>,
    ready_streams: Mutex<std::collections::HashSet<String>>,

    recording: OnceLock<Arc<RecordingManager>>,
    snapshot: OnceLock<Arc<SnapshotManager>>,
}
impl Controller {
    pub fn new(
        config: &MediaMtxConfig,
        monitor_readiness: ReadinessReceiver,
    ) -> Result<Self, ServiceError> {
        Self::with_bus(config, monitor_readiness, None)
    }
    pub fn with_bus(
        config: &MediaMtxConfig,
        monitor_readiness: ReadinessReceiver,
        bus: Option<Arc<Bus>>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::new(config)?,
            config: Mutex::new(GlobalConfDto::default()),
            config_fetched: Mutex::new(false),
            readiness: Readiness::new(),
            monitor_readiness,
            bus,
            ready_streams: Mutex::new(std::collections::HashSet::new()),
            recording: OnceLock::new(),
            snapshot: OnceLock::new(),
        })
    }

    /// Called once from process wiring, right after the recording manager
    /// is constructed (it already holds this controller as its engine).
    pub fn attach_recording_manager(
        &self,
        recording: Arc<RecordingManager>,
    ) {
        self.recording
            .set(recording)
            .unwrap_or_else(|_| panic!("attach_recording_manager called twice"));
    }
    /// Called once from process wiring, right after the snapshot manager
    /// is constructed (it already holds this controller as its engine).
    pub fn attach_snapshot_manager(
        &self,
        snapshot: Arc<SnapshotManager>,
    ) {
        self.snapshot
            .set(snapshot)
            .unwrap_or_else(|_| panic!("attach_snapshot_manager called twice"));
    }
    pub fn get_recording_manager(&self) -> &Arc<RecordingManager> {
        self.recording.get().expect("recording manager attached during startup")
    }
    pub fn get_snapshot_manager(&self) -> &Arc<SnapshotManager> {
        self.snapshot.get().expect("snapshot manager attached during startup")
    }

    pub fn subscribe_to_readiness(&self) -> ReadinessReceiver {
        self.readiness.subscribe()
    }
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Progressive readiness evaluation: ready iff the config has been
    /// fetched at least once, the camera monitor has completed its first
    /// sweep, and the circuit is not OPEN. Called after every operation
    /// that could flip one of those three; fires the readiness event
    /// exactly once.
    fn recheck_readiness(&self) {
        if self.readiness.is_ready() {
            return;
        }
        let config_fetched = *self.config_fetched.lock();
        let monitor_ready = self.monitor_readiness.is_ready();
        let circuit_ok = self.client.circuit_state() != CircuitState::Open;
        if config_fetched && monitor_ready && circuit_ok {
            self.readiness.signal_ready();
        }
    }

    // config ------------------------------------------------------------
    pub async fn get_config(
        &self,
        cancel: &CancellationToken,
    ) -> Result<GlobalConfDto, ServiceError> {
        let bytes = self.client.get("/v3/config/global/get", cancel).await?;
        let config: GlobalConfDto = serde_json::from_slice(&bytes)
            .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))?;
        *self.config.lock() = config.clone();
        *self.config_fetched.lock() = true;
        self.recheck_readiness();
        Ok(config)
    }
    pub async fn update_config(
        &self,
        patch: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        let body = bytes::Bytes::from(serde_json::to_vec(&patch).unwrap());
        self.client.patch("/v3/config/global/patch", Some(body), cancel).await?;
        Ok(())
    }

    // health / metrics ----------------------------------------------------
    pub async fn get_health(
        &self,
        cancel: &CancellationToken,
    ) -> EngineHealth {
        let reachable = self.client.health_check(cancel).await.is_ok();
        self.recheck_readiness();
        EngineHealth {
            reachable,
            circuit: self.client.circuit_state(),
        }
    }
    pub async fn get_metrics(
        &self,
        cancel: &CancellationToken,
    ) -> Result<EngineMetrics, ServiceError> {
        let streams = self.get_streams(cancel).await?;
        Ok(EngineMetrics {
            path_count: streams.len(),
            ready_path_count: streams
                .iter()
                .filter(|stream| stream.status == super::model::StreamStatus::Ready)
                .count(),
            bytes_received_total: streams.iter().map(|stream| stream.bytes_received).sum(),
            bytes_sent_total: streams.iter().map(|stream| stream.bytes_sent).sum(),
            circuit: self.client.circuit_state(),
        })
    }
    /// `GetSystemMetrics`: engine metrics folded with this controller's own
    /// circuit state and the monitor's cycle counters, so the RPC layer
    /// gets a full health snapshot in one round trip.
    pub async fn get_system_metrics(
        &self,
        monitor_stats: crate::camera::stats::MonitorStats,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ServiceError> {
        let metrics = self.get_metrics(cancel).await?;
        Ok(json!({
            "engine": metrics,
            "monitor": monitor_stats,
        }))
    }

    // paths (configuration) ------------------------------------------------
    pub async fn get_paths(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Path>, ServiceError> {
        self.get_streams(cancel).await
    }
    pub async fn get_path(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Path, ServiceError> {
        self.get_stream(name, cancel).await
    }
    pub async fn create_path(
        &self,
        name: &str,
        source: &str,
        on_demand: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        if self.path_exists(name, cancel).await? {
            // never create two paths for the same device; if a path with
            // the expected name exists, adopt it.
            return Ok(());
        }
        let body = bytes::Bytes::from(
            serde_json::to_vec(&json!({ "source": source, "sourceOnDemand": on_demand })).unwrap(),
        );
        self.client
            .post(&format!("/v3/config/paths/add/{name}"), Some(body), cancel)
            .await?;
        Ok(())
    }
    pub async fn delete_path(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        match self.client.delete(&format!("/v3/config/paths/delete/{name}"), cancel).await {
            Ok(_) => Ok(()),
            Err(error) if error.kind == ErrorKind::HttpStatus => Ok(()), // idempotent-safe, not_found
            Err(error) => Err(error),
        }
    }
    async fn path_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        match self.client.get(&format!("/v3/config/paths/get/{name}"), cancel).await {
            Ok(_) => Ok(true),
            Err(error) if error.kind == ErrorKind::HttpStatus => Ok(false),
            Err(error) => Err(error),
        }
    }

    // streams (runtime) ----------------------------------------------------
    pub async fn get_streams(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Path>, ServiceError> {
        let conf_bytes = self.client.get("/v3/config/paths/list", cancel).await?;
        let conf: PathConfListDto = serde_json::from_slice(&conf_bytes)
            .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))?;

        let runtime_bytes = self.client.get("/v3/paths/list", cancel).await?;
        let runtime: PathRuntimeListDto = serde_json::from_slice(&runtime_bytes)
            .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))?;

        let paths = conf
            .items
            .into_iter()
            .map(|conf_item| {
                let runtime_item = runtime.items.iter().find(|item| item.name == conf_item.name);
                Path::derive(&conf_item, runtime_item)
            })
            .collect();
        Ok(paths)
    }
    pub async fn get_stream(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Stream, ServiceError> {
        let conf_bytes = self.client.get(&format!("/v3/config/paths/get/{name}"), cancel).await?;
        let conf: PathConfDto = serde_json::from_slice(&conf_bytes)
            .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))?;

        let runtime: Option<PathRuntimeDto> =
            match self.client.get(&format!("/v3/paths/get/{name}"), cancel).await {
                Ok(bytes) => Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))?,
                ),
                Err(error) if error.kind == ErrorKind::HttpStatus => None,
                Err(error) => return Err(error),
            };

        let stream = Path::derive(&conf, runtime.as_ref());
        if stream.status == super::model::StreamStatus::Ready {
            self.publish_stream_ready(name);
        } else {
            self.ready_streams.lock().remove(name);
        }
        Ok(stream)
    }
    pub async fn delete_stream(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.delete_path(name, cancel).await
    }
    pub async fn create_stream(
        &self,
        name: &str,
        source: &str,
        on_demand: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.create_path(name, source, on_demand, cancel).await
    }

    pub async fn patch_path(
        &self,
        name: &str,
        patch: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        let body = bytes::Bytes::from(serde_json::to_vec(&patch).unwrap());
        self.client
            .patch(&format!("/v3/config/paths/patch/{name}"), Some(body), cancel)
            .await?;
        Ok(())
    }

    pub async fn trigger_activation(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        // mediamtx activates an on-demand path by being asked to read it;
        // a cheap GET against its runtime entry is enough to kick it.
        self.client.get(&format!("/v3/paths/get/{name}"), cancel).await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), ServiceError> {
        self.client.close().await
    }

    /// Publishes `stream.ready` exactly once per Missing/NotReady -> Ready
    /// transition; repeated polls of an already-ready stream stay silent.
    fn publish_stream_ready(
        &self,
        name: &str,
    ) {
        if self.ready_streams.lock().insert(name.to_owned()) {
            if let Some(bus) = &self.bus {
                bus.publish(Topic::StreamReady, json!({ "stream": name }));
            }
        }
    }

    // recording facade (C5 delegation) -------------------------------------
    pub async fn start_recording(
        &self,
        device_id: crate::camera::Id,
        base_path: Option<PathBuf>,
    ) -> Result<RecordingSession, ServiceError> {
        self.get_recording_manager().start_recording(device_id, base_path).await
    }
    pub async fn start_advanced_recording(
        &self,
        device_id: crate::camera::Id,
        base_path: Option<PathBuf>,
        options: crate::recording::session::RecordingOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordingSession, ServiceError> {
        self.get_recording_manager()
            .start_advanced_recording(device_id, base_path, options, cancel)
            .await
    }
    pub async fn stop_recording(
        &self,
        session_id: crate::recording::session::SessionId,
    ) -> Result<RecordingSession, ServiceError> {
        self.get_recording_manager().stop_recording(session_id).await
    }
    pub async fn stop_advanced_recording(
        &self,
        session_id: crate::recording::session::SessionId,
    ) -> Result<RecordingSession, ServiceError> {
        self.get_recording_manager().stop_recording(session_id).await
    }
    pub async fn rotate_recording_file(
        &self,
        session_id: crate::recording::session::SessionId,
    ) -> Result<RecordingSession, ServiceError> {
        self.get_recording_manager().rotate_recording_file(session_id).await
    }
    pub fn get_recording_status(
        &self,
        session_id: crate::recording::session::SessionId,
    ) -> Option<RecordingSession> {
        self.get_recording_manager().get_recording_status(session_id)
    }
    pub fn is_device_recording(
        &self,
        device_id: crate::camera::Id,
    ) -> bool {
        self.get_recording_manager().is_device_recording(device_id)
    }
    pub fn get_active_recording(
        &self,
        device_id: crate::camera::Id,
    ) -> Option<RecordingSession> {
        self.get_recording_manager().get_active_recording(device_id)
    }
    pub fn get_active_recordings(&self) -> Vec<RecordingSession> {
        self.get_recording_manager().get_active_recordings()
    }
    pub async fn start_active_recording(
        &self,
        device_id: crate::camera::Id,
        base_path: Option<PathBuf>,
    ) -> Result<RecordingSession, ServiceError> {
        self.start_recording(device_id, base_path).await
    }
    pub async fn stop_active_recording(
        &self,
        device_id: crate::camera::Id,
    ) -> Result<RecordingSession, ServiceError> {
        let session = self
            .get_active_recording(device_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::SessionNotFound))?;
        self.stop_recording(session.id).await
    }

    // snapshot facade (C6 delegation) --------------------------------------
    pub async fn take_snapshot(
        &self,
        device_id: crate::camera::Id,
        base_path: Option<PathBuf>,
    ) -> Result<SnapshotRecord, ServiceError> {
        self.get_snapshot_manager().take_snapshot(device_id, base_path).await
    }
    pub async fn take_advanced_snapshot(
        &self,
        device_id: crate::camera::Id,
        base_path: Option<PathBuf>,
        options: SnapshotOptions,
        cancel: &CancellationToken,
    ) -> Result<SnapshotRecord, ServiceError> {
        self.get_snapshot_manager()
            .take_advanced_snapshot(device_id, base_path, options, cancel)
            .await
    }
}

/// Snapshot capture against a path that already has a live reader.
/// mediamtx itself has no single-frame HTTP endpoint; this assumes the
/// deployment pairs mediamtx with a frame-grab sidecar reachable on the
/// same base URL, which is the common pattern for mediamtx-fronted camera
/// stacks (documented as an assumption, not a verified endpoint shape).
#[async_trait]
impl crate::snapshot::SnapshotEngine for Controller {
    async fn path_state(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<crate::snapshot::PathState, ServiceError> {
        use crate::snapshot::PathState;
        match self.get_stream(name, cancel).await {
            Ok(stream) if stream.status == super::model::StreamStatus::Ready => Ok(PathState::Ready),
            Ok(_) => Ok(PathState::NotReady),
            Err(error) if error.kind == ErrorKind::HttpStatus => Ok(PathState::Missing),
            Err(error) => Err(error),
        }
    }
    async fn trigger_activation(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        Controller::trigger_activation(self, name, cancel).await
    }
    async fn capture_frame(
        &self,
        name: &str,
        _options: &crate::snapshot::SnapshotOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ServiceError> {
        let bytes = self.client.get(&format!("/v3/paths/{name}/snapshot"), cancel).await?;
        Ok(bytes.to_vec())
    }
}

/// Lets `recording::RecordingManager` and `snapshot::SnapshotManager` depend
/// on the trait rather than the concrete media-engine client.
#[async_trait]
impl crate::recording::RecordingEngine for Controller {
    async fn ensure_path(
        &self,
        name: &str,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.create_path(name, source, true, cancel).await
    }
    async fn configure_recording(
        &self,
        name: &str,
        record_dir: &std::path::Path,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.patch_path(
            name,
            json!({
                "record": true,
                "recordPath": record_dir.join("%Y-%m-%d_%H-%M-%S-%f").to_string_lossy(),
                "recordFormat": format,
            }),
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod test_controller {
    use super::*;
    use crate::util::readiness::Readiness;

    #[test]
    fn readiness_requires_all_three_conditions() {
        let monitor_readiness = Readiness::new();
        let controller = Controller::new(
            &MediaMtxConfig {
                base_url: "http://127.0.0.1".to_owned(),
                ..Default::default()
            },
            monitor_readiness.subscribe(),
        )
        .unwrap();

        assert!(!controller.is_ready());
        *controller.config_fetched.lock() = true;
        controller.recheck_readiness();
        assert!(!controller.is_ready(), "monitor not ready yet");

        monitor_readiness.signal_ready();
        controller.recheck_readiness();
        assert!(controller.is_ready());
    }
}
