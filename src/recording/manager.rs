// RecordingManager.
//
// Owns the `RecordingSession` table exclusively. Talks to the media engine
// only through the `RecordingEngine` trait seam so tests can inject a stub
// instead of a live mediamtx. Segment writing itself happens inside the
// engine; this module is bookkeeping, path construction, and retention.

use super::{
    paths::{compose_path, generate_basename},
    session::{RecordingOptions, RecordingSession, SessionId, Status},
};
use crate::{
    camera::{CameraDevice, Id, Status as CameraStatus},
    config::RecordingConfig,
    error::{ErrorKind, ServiceError},
    events::{Bus, Topic},
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait RecordingEngine: Send + Sync {
    async fn ensure_path(
        &self,
        name: &str,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError>;
    async fn configure_recording(
        &self,
        name: &str,
        record_dir: &std::path::Path,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError>;
}

pub trait DeviceLookup: Send + Sync {
    fn get_camera(
        &self,
        id: Id,
    ) -> Option<CameraDevice>;
}

pub struct RecordingManager {
    config: RecordingConfig,
    engine: Arc<dyn RecordingEngine>,
    devices: Arc<dyn DeviceLookup>,
    bus: Option<Arc<Bus>>,

    sessions: Mutex<HashMap<SessionId, RecordingSession>>,
    active_by_device: Mutex<HashMap<Id, SessionId>>,
}
impl RecordingManager {
    pub fn new(
        config: RecordingConfig,
        engine: Arc<dyn RecordingEngine>,
        devices: Arc<dyn DeviceLookup>,
        bus: Option<Arc<Bus>>,
    ) -> Self {
        Self {
            config,
            engine,
            devices,
            bus,
            sessions: Mutex::new(HashMap::new()),
            active_by_device: Mutex::new(HashMap::new()),
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

    fn device_dir(
        &self,
        device_id: Id,
    ) -> Option<String> {
        self.config.use_subdirs.then(|| device_id.to_string())
    }

    /// Preconditions: device known and connected, no existing recording
    /// session for the device.
    pub async fn start_recording(
        &self,
        device_id: Id,
        base_path: Option<PathBuf>,
    ) -> Result<RecordingSession, ServiceError> {
        self.start_advanced_recording(device_id, base_path, RecordingOptions::default(), &CancellationToken::new())
            .await
    }

    pub async fn start_advanced_recording(
        &self,
        device_id: Id,
        base_path: Option<PathBuf>,
        options: RecordingOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordingSession, ServiceError> {
        let device = self
            .devices
            .get_camera(device_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::DeviceUnknown))?;
        if device.status != CameraStatus::Connected {
            return Err(ServiceError::from_kind(ErrorKind::DeviceUnavailable));
        }
        if self.active_by_device.lock().contains_key(&device_id) {
            return Err(ServiceError::from_kind(ErrorKind::DeviceBusy));
        }

        let base_path = base_path.unwrap_or_else(|| self.config.path.clone());
        let stream_name = device_id.to_string();
        let source = format!("rtsp://127.0.0.1/{stream_name}");

        self.engine.ensure_path(&stream_name, &source, cancel).await?;

        let basename = generate_basename("rec");
        let file_path = compose_path(
            &base_path,
            self.device_dir(device_id).as_deref(),
            self.config.use_subdirs,
            &basename,
            options.format.extension(),
        );
        let record_dir = file_path.parent().unwrap_or(&base_path).to_path_buf();
        self.engine
            .configure_recording(&stream_name, &record_dir, options.format.extension(), cancel)
            .await?;

        let session = RecordingSession {
            id: SessionId::new(),
            device_id,
            stream_name,
            started_at: Utc::now(),
            status: Status::Recording,
            current_file: file_path,
            previous_files: Vec::new(),
            rotation_count: 0,
            options,
            error_message: None,
        };

        self.sessions.lock().insert(session.id, session.clone());
        self.active_by_device.lock().insert(device_id, session.id);

        self.publish(
            Topic::RecordingStart,
            serde_json::json!({ "session_id": session.id.to_string(), "device": device_id.to_string() }),
        );

        Ok(session)
    }

    /// Idempotent after Stopped.
    pub async fn stop_recording(
        &self,
        session_id: SessionId,
    ) -> Result<RecordingSession, ServiceError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::SessionNotFound))?;

        if session.status == Status::Stopped {
            return Ok(session.clone());
        }
        if session.status == Status::Error {
            return Err(ServiceError::from_kind(ErrorKind::SessionTerminal));
        }

        session.status = Status::Stopped;
        let result = session.clone();
        drop(sessions);

        self.active_by_device.lock().remove(&result.device_id);
        self.publish(
            Topic::RecordingStop,
            serde_json::json!({ "session_id": result.id.to_string(), "device": result.device_id.to_string() }),
        );

        Ok(result)
    }

    pub async fn rotate_recording_file(
        &self,
        session_id: SessionId,
    ) -> Result<RecordingSession, ServiceError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| ServiceError::from_kind(ErrorKind::SessionNotFound))?;
        if session.status != Status::Recording {
            return Err(ServiceError::from_kind(ErrorKind::SessionTerminal));
        }

        let base_dir = session
            .current_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.config.path.clone());
        let basename = generate_basename("rec");
        let rotated_file = base_dir.join(format!("{basename}.{}", session.options.format.extension()));
        let previous_file = std::mem::replace(&mut session.current_file, rotated_file);
        session.previous_files.push(previous_file);
        session.rotation_count += 1;

        Ok(session.clone())
    }

    pub fn get_recording_status(
        &self,
        session_id: SessionId,
    ) -> Option<RecordingSession> {
        self.sessions.lock().get(&session_id).cloned()
    }
    pub fn is_device_recording(
        &self,
        device_id: Id,
    ) -> bool {
        self.active_by_device.lock().contains_key(&device_id)
    }
    pub fn get_active_recording(
        &self,
        device_id: Id,
    ) -> Option<RecordingSession> {
        let session_id = *self.active_by_device.lock().get(&device_id)?;
        self.get_recording_status(session_id)
    }
    pub fn get_active_recordings(&self) -> Vec<RecordingSession> {
        self.active_by_device
            .lock()
            .values()
            .filter_map(|id| self.get_recording_status(*id))
            .collect()
    }

    /// Stops every active session, used on shutdown so no recording is left
    /// dangling with its file never closed out.
    pub async fn stop_all(&self) -> Vec<Result<RecordingSession, ServiceError>> {
        let mut results = Vec::new();
        for session in self.get_active_recordings() {
            results.push(self.stop_recording(session.id).await);
        }
        results
    }

    /// Retention sweep: remove files older than `max_age` and enforce a
    /// per-device file-count cap, oldest first, never touching a file
    /// belonging to an active session (including the predecessor in an
    /// in-progress rotation chain).
    pub async fn cleanup_old_recordings(
        &self,
        max_age: Duration,
        max_count: usize,
    ) -> Result<usize, ServiceError> {
        let protected: std::collections::HashSet<PathBuf> = self
            .sessions
            .lock()
            .values()
            .filter(|session| session.status == Status::Recording || session.status == Status::Stopping)
            .flat_map(|session| {
                std::iter::once(session.current_file.clone()).chain(session.previous_files.iter().cloned())
            })
            .collect();

        cleanup_directory(&self.config.path, max_age, max_count, &protected).await
    }
}

/// Retention sweep shared by recordings and snapshots: remove files older
/// than `max_age` and enforce a per-directory file-count cap, oldest first,
/// never removing a path in `protected` (a session's active file, including
/// the predecessor of an in-progress rotation).
pub async fn cleanup_directory(
    root: &std::path::Path,
    max_age: Duration,
    max_count: usize,
    protected: &std::collections::HashSet<PathBuf>,
) -> Result<usize, ServiceError> {
    let mut removed = 0usize;
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(error) => return Err(ServiceError::new(ErrorKind::Internal, error)),
    };

    let mut per_dir: HashMap<PathBuf, Vec<(PathBuf, std::time::SystemTime)>> = HashMap::new();
    while let Some(entry) = entries.next_entry().await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))? {
        collect_recursive(&entry.path(), &mut per_dir).await?;
    }

    let now = std::time::SystemTime::now();
    for (_, mut files) in per_dir {
        files.sort_by_key(|(_, modified)| std::cmp::Reverse(*modified));

        for (index, (path, modified)) in files.iter().enumerate() {
            if protected.contains(path) {
                continue;
            }
            let age = now.duration_since(*modified).unwrap_or(Duration::ZERO);
            let over_count_cap = index >= max_count;
            let over_age_cap = age > max_age;
            if over_count_cap || over_age_cap {
                if tokio::fs::remove_file(path).await.is_ok() {
                    removed += 1;
                }
            }
        }
    }

    Ok(removed)
}

async fn collect_recursive(
    path: &std::path::Path,
    per_dir: &mut HashMap<PathBuf, Vec<(PathBuf, std::time::SystemTime)>>,
) -> Result<(), ServiceError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
    if metadata.is_dir() {
        let mut entries = tokio::fs::read_dir(path).await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
        while let Some(entry) = entries.next_entry().await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))? {
            Box::pin(collect_recursive(&entry.path(), per_dir)).await?;
        }
    } else {
        let modified = metadata.modified().map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
        let dir = path.parent().unwrap_or(path).to_path_buf();
        per_dir.entry(dir).or_default().push((path.to_path_buf(), modified));
    }
    Ok(())
}
