// SnapshotManager.
//
// Tiered capture: USB-direct shells out to ffmpeg directly against the
// device node; RTSP-ready/activation ask the media engine for a frame
// through the `SnapshotEngine` trait seam so this module stays testable
// without a live mediamtx.

use super::record::{Format, LatencyBucket, SnapshotOptions, SnapshotRecord, Tier};
use crate::{
    camera::Id,
    config::SnapshotsConfig,
    error::{ErrorKind, ServiceError},
    events::{Bus, Topic},
    recording::paths::{compose_path, generate_basename},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    path::PathBuf,
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{io::AsyncReadExt, process::Command};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    Missing,
    Ready,
    NotReady,
}

#[async_trait]
pub trait SnapshotEngine: Send + Sync {
    async fn path_state(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathState, ServiceError>;
    async fn trigger_activation(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError>;
    async fn capture_frame(
        &self,
        name: &str,
        options: &SnapshotOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ServiceError>;
}

pub trait DeviceNodeLookup: Send + Sync {
    fn device_node(
        &self,
        id: Id,
    ) -> Option<PathBuf>;
}

pub struct SnapshotManager {
    config: SnapshotsConfig,
    ffmpeg_binary: PathBuf,
    engine: Arc<dyn SnapshotEngine>,
    devices: Arc<dyn DeviceNodeLookup>,
    bus: Option<Arc<Bus>>,
}
impl SnapshotManager {
    pub fn new(
        config: SnapshotsConfig,
        ffmpeg_binary: PathBuf,
        engine: Arc<dyn SnapshotEngine>,
        devices: Arc<dyn DeviceNodeLookup>,
        bus: Option<Arc<Bus>>,
    ) -> Self {
        Self {
            config,
            ffmpeg_binary,
            engine,
            devices,
            bus,
        }
    }

    pub async fn take_snapshot(
        &self,
        device_id: Id,
        base_path: Option<PathBuf>,
    ) -> Result<SnapshotRecord, ServiceError> {
        self.take_advanced_snapshot(device_id, base_path, SnapshotOptions::default(), &CancellationToken::new())
            .await
    }

    pub async fn take_advanced_snapshot(
        &self,
        device_id: Id,
        base_path: Option<PathBuf>,
        options: SnapshotOptions,
        cancel: &CancellationToken,
    ) -> Result<SnapshotRecord, ServiceError> {
        let started = Instant::now();
        let stream_name = device_id.to_string();
        let total_timeout: Duration = self.config.total_timeout.into();

        let last_tier = Arc::new(parking_lot::Mutex::new(None::<Tier>));
        let attempt = tokio::time::timeout(
            total_timeout,
            self.capture_via_tiers(device_id, &stream_name, &options, Arc::clone(&last_tier), cancel),
        )
        .await
        .map_err(|_| {
            let error = ServiceError::from_kind(ErrorKind::Timeout);
            match *last_tier.lock() {
                Some(tier) => error.with_context(format!("last attempted tier: {tier:?}")),
                None => error,
            }
        })?;
        let (bytes, tier) = attempt?;

        let base_path = base_path.unwrap_or_else(|| self.config.path.clone());
        let basename = generate_basename("snap");
        let device_dir = self.config.use_subdirs.then(|| stream_name.clone());
        let output_path = compose_path(
            &base_path,
            device_dir.as_deref(),
            self.config.use_subdirs,
            &basename,
            options.format.extension(),
        );
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
        }
        tokio::fs::write(&output_path, &bytes)
            .await
            .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;

        let duration = started.elapsed();
        let record = SnapshotRecord {
            id: uuid::Uuid::new_v4(),
            device_id,
            format: options.format,
            quality: options.quality,
            output_path,
            created_at: Utc::now(),
            tier,
            duration,
            latency_bucket: self.classify_latency(duration),
        };

        self.publish(
            Topic::SnapshotTaken,
            serde_json::json!({ "device": device_id.to_string(), "tier": tier, "duration_ms": duration.as_millis() }),
        );

        Ok(record)
    }

    fn classify_latency(
        &self,
        duration: Duration,
    ) -> LatencyBucket {
        if duration <= self.config.latency_immediate.into() {
            LatencyBucket::Immediate
        } else if duration <= self.config.latency_acceptable.into() {
            LatencyBucket::Acceptable
        } else if duration <= self.config.latency_slow.into() {
            LatencyBucket::Slow
        } else {
            LatencyBucket::Timeout
        }
    }

    fn publish(
        &self,
        topic: Topic,
        payload: serde_json::Value,
    ) {
        if let Some(bus) = &self.bus {
            bus.publish(topic, payload);
        }
    }

    async fn capture_via_tiers(
        &self,
        device_id: Id,
        stream_name: &str,
        options: &SnapshotOptions,
        last_tier: Arc<parking_lot::Mutex<Option<Tier>>>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<u8>, Tier), ServiceError> {
        let path_state = self.engine.path_state(stream_name, cancel).await.unwrap_or(PathState::Missing);

        if path_state == PathState::Missing {
            if let Some(node) = self.devices.device_node(device_id) {
                *last_tier.lock() = Some(Tier::UsbDirect);
                let tier1: Duration = self.config.tier1_timeout.into();
                if let Ok(Ok(bytes)) =
                    tokio::time::timeout(tier1, self.capture_usb_direct(&node, options)).await
                {
                    return Ok((bytes, Tier::UsbDirect));
                }
            }
        }

        if path_state == PathState::Ready {
            *last_tier.lock() = Some(Tier::RtspReady);
            let tier2: Duration = self.config.tier2_timeout.into();
            if let Ok(Ok(bytes)) =
                tokio::time::timeout(tier2, self.engine.capture_frame(stream_name, options, cancel)).await
            {
                // an empty/truncated frame is this tier's failure, not a
                // short success — fall through to Activation rather than
                // hand back malformed media.
                if !bytes.is_empty() {
                    return Ok((bytes, Tier::RtspReady));
                }
            }
        }

        *last_tier.lock() = Some(Tier::Activation);
        let tier3: Duration = self.config.tier3_timeout.into();
        let trigger_timeout: Duration = self.config.trigger_timeout.into();
        let activation = async {
            self.engine.trigger_activation(stream_name, cancel).await?;
            tokio::time::sleep(trigger_timeout).await;
            self.engine.capture_frame(stream_name, options, cancel).await
        };
        match tokio::time::timeout(tier3 + trigger_timeout, activation).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => Ok((bytes, Tier::Activation)),
            Ok(Ok(_)) => Err(
                ServiceError::from_kind(ErrorKind::EngineUnavailable).with_context("last attempted tier: Activation")
            ),
            Ok(Err(error)) => Err(error.with_context("last attempted tier: Activation")),
            Err(_) => Err(ServiceError::from_kind(ErrorKind::Timeout).with_context("last attempted tier: Activation")),
        }
    }

    async fn capture_usb_direct(
        &self,
        device_node: &std::path::Path,
        options: &SnapshotOptions,
    ) -> Result<Vec<u8>, ServiceError> {
        let codec = match options.format {
            Format::Jpeg => "mjpeg",
            Format::Png => "png",
            Format::Bmp => "bmp",
        };

        let mut command = Command::new(&self.ffmpeg_binary);
        command
            .env_clear()
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .args(["-loglevel", "error"])
            .arg("-hide_banner")
            .arg("-nostdin")
            .args(["-f", "v4l2"])
            .args(["-i", &device_node.to_string_lossy()])
            .args(["-frames:v", "1"])
            .args(["-f", "image2pipe"])
            .args(["-vcodec", codec])
            .arg("-");

        let mut child = command.spawn().map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
        let mut stdout = child.stdout.take().expect("stdout piped");

        let mut bytes = Vec::new();
        stdout
            .read_to_end(&mut bytes)
            .await
            .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;

        let status = child.wait().await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
        if !status.success() || bytes.is_empty() {
            return Err(ServiceError::from_kind(ErrorKind::EngineUnavailable));
        }
        Ok(bytes)
    }

    /// Retention sweep mirroring `recording::RecordingManager::cleanup_old_recordings`.
    pub async fn cleanup_old_snapshots(
        &self,
        max_age: Duration,
        max_count: usize,
    ) -> Result<usize, ServiceError> {
        crate::recording::manager::cleanup_directory(
            &self.config.path,
            max_age,
            max_count,
            &std::collections::HashSet::new(),
        )
        .await
    }
}

#[cfg(test)]
mod test_manager {
    use super::*;

    struct StubEngine {
        state: PathState,
        frame: Vec<u8>,
    }
    #[async_trait]
    impl SnapshotEngine for StubEngine {
        async fn path_state(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<PathState, ServiceError> {
            Ok(self.state)
        }
        async fn trigger_activation(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), ServiceError> {
            Ok(())
        }
        async fn capture_frame(
            &self,
            _name: &str,
            _options: &SnapshotOptions,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, ServiceError> {
            Ok(self.frame.clone())
        }
    }

    struct StubDevices;
    impl DeviceNodeLookup for StubDevices {
        fn device_node(
            &self,
            _id: Id,
        ) -> Option<PathBuf> {
            None // forces the RTSP-ready/activation path in these unit tests.
        }
    }

    fn manager(state: PathState) -> SnapshotManager {
        manager_with_frame(state, vec![0xFF, 0xD8, 0xFF])
    }

    fn manager_with_frame(
        state: PathState,
        frame: Vec<u8>,
    ) -> SnapshotManager {
        SnapshotManager::new(
            SnapshotsConfig {
                path: std::env::temp_dir().join(format!("snapmgr-test-{}", uuid::Uuid::new_v4())),
                ..Default::default()
            },
            PathBuf::from("/bin/true"),
            Arc::new(StubEngine { state, frame }),
            Arc::new(StubDevices),
            None,
        )
    }

    #[tokio::test]
    async fn ready_path_captures_via_tier_two() {
        let manager = manager(PathState::Ready);
        let record = manager.take_snapshot(Id::from_node_index(0), None).await.unwrap();
        assert_eq!(record.tier, Tier::RtspReady);
    }

    #[tokio::test]
    async fn missing_then_not_ready_path_falls_through_to_activation() {
        let manager = manager(PathState::NotReady);
        let record = manager.take_snapshot(Id::from_node_index(0), None).await.unwrap();
        assert_eq!(record.tier, Tier::Activation);
    }

    /// An empty frame from the RTSP-ready tier is this tier's failure, not
    /// a truncated success — it must fall through to Activation rather
    /// than hand back zero bytes as a snapshot.
    #[tokio::test]
    async fn empty_frame_from_rtsp_ready_falls_through_to_activation() {
        let manager = manager_with_frame(PathState::Ready, Vec::new());
        let error = manager.take_snapshot(Id::from_node_index(0), None).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::EngineUnavailable);
    }

    #[tokio::test]
    async fn rejects_unknown_snapshot_options() {
        let result: Result<SnapshotOptions, _> = serde_json::from_str(r#"{"format":"jpeg","bogus":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn latency_classification_buckets_correctly() {
        let manager = manager(PathState::Ready);
        assert_eq!(manager.classify_latency(Duration::from_millis(100)), LatencyBucket::Immediate);
        assert_eq!(manager.classify_latency(Duration::from_secs(20)), LatencyBucket::Timeout);
    }
}
