// Monitor — the hybrid reconciliation loop.
//
// Single owner task drives the `CameraDevice` table; lookup methods only
// take a `parking_lot::Mutex` lock for the duration of a clone, so reads
// return defensive copies and cross-component access stays read-only.
// Kernel events short-circuit a single node's reconciliation without ever
// replacing the periodic sweep — a missed or coalesced inotify event just
// means that node waits for the next poll tick instead of hanging forever.

use super::{
    device::{CameraDevice, Id, Status},
    probe::CapabilityProbe,
    stats::{MonitorStats, Stats},
    CameraEvent, EventHandler, Listener,
};
use crate::{
    config::CameraConfig,
    error::ErrorKind,
    events::{Bus, Topic},
    util::{
        async_flag,
        readiness::{Readiness, ReadinessReceiver},
        runtime::{Exited, Runnable},
    },
};
use anyhow::{anyhow, Context, Error};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use futures::{future::FutureExt, join, pin_mut, select, stream::StreamExt};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;

#[cfg(target_os = "linux")]
use std::io;

#[cfg(target_os = "linux")]
use inotify::{EventOwned, Inotify, WatchMask};

struct DeviceEntry {
    device: CameraDevice,
    consecutive_failures: u32,
}

pub struct Monitor {
    config: CameraConfig,
    probe: Arc<dyn CapabilityProbe>,

    devices: Mutex<HashMap<Id, DeviceEntry>>,
    listeners: Mutex<Vec<Listener>>,
    bus: Option<Arc<Bus>>,

    readiness: Readiness,
    stats: Stats,
}
impl Monitor {
    pub fn new(
        config: CameraConfig,
        probe: Arc<dyn CapabilityProbe>,
        bus: Option<Arc<Bus>>,
    ) -> Self {
        Self {
            config,
            probe,
            devices: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            bus,
            readiness: Readiness::new(),
            stats: Stats::new(),
        }
    }

    fn node_path(index: u32) -> PathBuf {
        PathBuf::from(format!("/dev/video{index}"))
    }

    // lookups — always a clone of the current table entry, never a reference out.
    pub fn get_connected_cameras(&self) -> HashMap<Id, CameraDevice> {
        self.devices
            .lock()
            .values()
            .filter(|entry| entry.device.status == Status::Connected)
            .map(|entry| (entry.device.id, entry.device.clone()))
            .collect()
    }
    pub fn get_camera_by_device_path(
        &self,
        path: &Path,
    ) -> Option<CameraDevice> {
        self.devices
            .lock()
            .values()
            .find(|entry| entry.device.os_path == path)
            .map(|entry| entry.device.clone())
    }
    pub fn get_camera_by_id(
        &self,
        id: Id,
    ) -> Option<CameraDevice> {
        self.devices.lock().get(&id).map(|entry| entry.device.clone())
    }

    // listener registration.
    pub fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    ) {
        self.listeners.lock().push(Listener::Blocking(handler));
    }
    pub fn add_event_callback(
        &self,
        buffer: usize,
    ) -> mpsc::Receiver<CameraEvent> {
        let (sender, receiver) = mpsc::channel(buffer);
        self.listeners.lock().push(Listener::Buffered(sender));
        receiver
    }
    fn emit(
        &self,
        event: CameraEvent,
    ) {
        for listener in self.listeners.lock().iter() {
            match listener {
                Listener::Blocking(handler) => handler.handle(&event),
                Listener::Buffered(sender) => {
                    if sender.try_send(event.clone()).is_err() {
                        log::warn!("camera monitor: dropped event, buffered listener is full or gone");
                    }
                }
            }
        }

        if let Some(bus) = &self.bus {
            let (topic, device) = match &event {
                CameraEvent::Connected(device) => (Topic::CameraConnected, device),
                CameraEvent::Disconnected(device) => (Topic::CameraDisconnected, device),
                CameraEvent::StatusChanged(device) => (Topic::CameraStatus, device),
                CameraEvent::Error(device) => (Topic::CameraStatus, device),
            };
            bus.publish(
                topic,
                serde_json::json!({ "device": device.id.to_string(), "status": device.status }),
            );
        }
    }

    pub fn subscribe_to_readiness(&self) -> ReadinessReceiver {
        self.readiness.subscribe()
    }
    pub fn get_monitor_stats(&self) -> MonitorStats {
        self.stats.snapshot()
    }

    // reconciliation loop.
    async fn reconcile_once(&self) {
        for index in self.config.device_range.clone() {
            let id = Id::from_node_index(index);
            let path = Self::node_path(index);
            let exists = self.probe.node_exists(&path).await;
            self.handle_node(id, path, exists).await;
        }

        self.stats.record_cycle();
        self.stats
            .set_known_device_count(self.devices.lock().len() as u32);
    }

    async fn handle_node(
        &self,
        id: Id,
        path: PathBuf,
        exists: bool,
    ) {
        let now = Utc::now();

        if !exists {
            let disconnected = {
                let mut devices = self.devices.lock();
                match devices.get_mut(&id) {
                    Some(entry) if entry.device.status != Status::Disconnected => {
                        entry.device.status = Status::Disconnected;
                        entry.device.last_seen = now;
                        entry.consecutive_failures = 0;
                        Some(entry.device.clone())
                    }
                    _ => None,
                }
            };
            if let Some(device) = disconnected {
                self.emit(CameraEvent::Disconnected(device));
            }
            return;
        }

        let should_probe = {
            let mut devices = self.devices.lock();
            let entry = devices.entry(id).or_insert_with(|| DeviceEntry {
                device: CameraDevice::new_unprobed(id, path.clone(), now),
                consecutive_failures: 0,
            });
            entry.device.last_seen = now;
            entry.device.os_path = path.clone();
            entry.device.capabilities.is_none() || entry.device.status == Status::Error
        };

        if should_probe {
            self.probe_device(id, &path, now).await;
        }
    }

    async fn probe_device(
        &self,
        id: Id,
        path: &Path,
        now: DateTime<Utc>,
    ) {
        self.stats.record_probe_attempt();

        let mut outcome = None;
        let mut last_error_message = None;
        for attempt in 0..=self.config.probe_retries {
            match self
                .probe
                .probe(path, self.config.probe_timeout.into())
                .await
            {
                Ok(capabilities) => {
                    outcome = Some(capabilities);
                    break;
                }
                Err(error) => {
                    match error.kind {
                        ErrorKind::Timeout => self.stats.record_probe_timeout(),
                        ErrorKind::EngineProtocol => self.stats.record_probe_parse_error(),
                        _ => self.stats.record_probe_command_error(),
                    }
                    last_error_message = Some(error.to_string());
                    if attempt < self.config.probe_retries {
                        tokio::time::sleep(self.config.probe_retry_interval.into()).await;
                    }
                }
            }
        }

        match outcome {
            Some(capabilities) => {
                self.stats.record_probe_success();
                if let Some(event) = self.record_probe_success(id, capabilities, now) {
                    self.emit(event);
                }
            }
            None => {
                if let Some(event) = self.record_probe_failure(id, last_error_message) {
                    self.emit(event);
                }
            }
        }
    }

    fn record_probe_success(
        &self,
        id: Id,
        capabilities: super::capabilities::V4L2Capabilities,
        now: DateTime<Utc>,
    ) -> Option<CameraEvent> {
        let mut devices = self.devices.lock();
        let entry = devices.get_mut(&id)?;

        let was_connected = entry.device.status == Status::Connected;
        let previous_capabilities = entry.device.capabilities.take();

        entry.consecutive_failures = 0;
        entry.device.status = Status::Connected;
        entry.device.last_seen = now;
        entry.device.driver = capabilities.driver.clone();
        entry.device.name = capabilities.card.clone();
        entry.device.error_message = None;
        entry.device.capabilities = Some(capabilities);

        if !was_connected {
            return Some(CameraEvent::Connected(entry.device.clone()));
        }

        let structurally_same = previous_capabilities
            .as_ref()
            .zip(entry.device.capabilities.as_ref())
            .is_some_and(|(previous, current)| previous.structurally_equal(current));
        if structurally_same {
            None
        } else {
            Some(CameraEvent::StatusChanged(entry.device.clone()))
        }
    }

    fn record_probe_failure(
        &self,
        id: Id,
        error_message: Option<String>,
    ) -> Option<CameraEvent> {
        let mut devices = self.devices.lock();
        let entry = devices.get_mut(&id)?;

        entry.consecutive_failures += 1;
        if entry.consecutive_failures < self.config.persistent_failure_threshold
            || entry.device.status == Status::Error
        {
            return None;
        }

        entry.device.status = Status::Error;
        entry.device.error_message = error_message;
        Some(CameraEvent::Error(entry.device.clone()))
    }

    // poll loop.
    async fn poll_loop_run(
        &self,
        mut exit_flag: async_flag::Receiver,
    ) -> Exited {
        self.stats
            .set_current_poll_interval_ms(Duration::from(self.config.poll_interval).as_millis() as u64);

        loop {
            self.reconcile_once().await;
            self.readiness.signal_ready();

            select! {
                () = tokio::time::sleep(self.config.poll_interval.into()).fuse() => {},
                () = &mut exit_flag => break,
            }
        }

        Exited
    }

    // kernel-event short-circuit, linux only.
    #[cfg(target_os = "linux")]
    async fn inotify_handle_event(
        &self,
        event: Result<EventOwned, io::Error>,
    ) -> Result<(), Error> {
        let event = event.context("event")?;
        let name = event
            .name
            .ok_or_else(|| anyhow!("missing file name"))
            .context("name")?;
        let name = name.to_string_lossy();

        let Some(index) = name.strip_prefix("video").and_then(|rest| rest.parse::<u32>().ok()) else {
            return Ok(());
        };

        self.stats.record_kernel_event();
        let id = Id::from_node_index(index);
        let path = Self::node_path(index);
        let exists = self.probe.node_exists(&path).await;
        self.handle_node(id, path, exists).await;

        Ok(())
    }
    #[cfg(target_os = "linux")]
    async fn inotify_run_once(
        &self,
        mut exit_flag: async_flag::Receiver,
    ) -> Result<Exited, Error> {
        let mut inotify_instance = Inotify::init().context("inotify_instance")?;
        inotify_instance
            .add_watch(Path::new("/dev"), WatchMask::CREATE | WatchMask::DELETE)
            .context("add_watch")?;

        const INOTIFY_BUFFER_SIZE: usize = 1024;
        let mut buffer = BytesMut::with_capacity(INOTIFY_BUFFER_SIZE);
        unsafe { buffer.set_len(INOTIFY_BUFFER_SIZE) };

        let error_stream = inotify_instance
            .event_stream(buffer)
            .context("event_stream")?
            .filter_map(|event| async move {
                match self
                    .inotify_handle_event(event)
                    .await
                    .context("inotify_handle_event")
                {
                    Ok(()) => None,
                    Err(error) => Some(error),
                }
            });
        pin_mut!(error_stream);

        select! {
            error = error_stream.next().fuse() => match error {
                Some(error) => Err(error),
                None => Err(anyhow!("error_stream closed")),
            },
            () = &mut exit_flag => Ok(Exited),
        }
    }
    #[cfg(target_os = "linux")]
    async fn inotify_run(
        &self,
        mut exit_flag: async_flag::Receiver,
    ) -> Exited {
        const ERROR_DELAY: Duration = Duration::from_secs(5);

        loop {
            let error = match self
                .inotify_run_once(exit_flag.clone())
                .await
                .context("inotify_run_once")
            {
                Ok(Exited) => break,
                Err(error) => error,
            };
            log::error!("camera monitor inotify watch: {error:?}");

            select! {
                () = tokio::time::sleep(ERROR_DELAY).fuse() => {},
                () = &mut exit_flag => break,
            }
        }

        Exited
    }
    // no kernel backend on non-linux targets: the periodic sweep is the only
    // discovery mechanism there.
    #[cfg(not(target_os = "linux"))]
    async fn inotify_run(
        &self,
        exit_flag: async_flag::Receiver,
    ) -> Exited {
        exit_flag.await;
        Exited
    }

    async fn run(
        &self,
        exit_flag: async_flag::Receiver,
    ) -> Exited {
        self.stats.set_running(true);
        let (_, _): (Exited, Exited) = join!(
            self.poll_loop_run(exit_flag.clone()),
            self.inotify_run(exit_flag)
        );
        self.stats.set_running(false);

        Exited
    }
}
#[async_trait]
impl Runnable for Monitor {
    async fn run(
        &self,
        exit_flag: async_flag::Receiver,
    ) -> Exited {
        self.run(exit_flag).await
    }
}

impl crate::recording::DeviceLookup for Monitor {
    fn get_camera(
        &self,
        id: Id,
    ) -> Option<CameraDevice> {
        self.get_camera_by_id(id)
    }
}

impl crate::snapshot::DeviceNodeLookup for Monitor {
    fn device_node(
        &self,
        id: Id,
    ) -> Option<std::path::PathBuf> {
        self.get_camera_by_id(id).map(|device| device.os_path)
    }
}

#[cfg(test)]
mod test_monitor {
    use super::*;
    use crate::camera::{capabilities::V4L2Capabilities, probe::CapabilityProbe};
    use crate::error::{ErrorKind, ServiceError};
    use async_trait::async_trait;
    use parking_lot::Mutex as StdMutex;
    use std::{collections::HashSet, time::Duration};

    struct StubProbe {
        existing: StdMutex<HashSet<PathBuf>>,
        capabilities: V4L2Capabilities,
        fail_until: StdMutex<u32>,
    }
    impl StubProbe {
        fn always_succeeds(existing: &[u32]) -> Self {
            Self {
                existing: StdMutex::new(existing.iter().map(|i| Monitor::node_path(*i)).collect()),
                capabilities: V4L2Capabilities {
                    driver: "uvcvideo".to_owned(),
                    card: "Stub Cam".to_owned(),
                    bus_info: "usb-0".to_owned(),
                    capability_flags: vec!["Video Capture".to_owned()],
                    formats: vec![],
                },
                fail_until: StdMutex::new(0),
            }
        }
    }
    #[async_trait]
    impl CapabilityProbe for StubProbe {
        async fn node_exists(
            &self,
            path: &Path,
        ) -> bool {
            self.existing.lock().contains(path)
        }
        async fn probe(
            &self,
            _path: &Path,
            _timeout: Duration,
        ) -> Result<V4L2Capabilities, ServiceError> {
            let mut fail_until = self.fail_until.lock();
            if *fail_until > 0 {
                *fail_until -= 1;
                return Err(ServiceError::from_kind(ErrorKind::Timeout));
            }
            Ok(self.capabilities.clone())
        }
    }

    fn small_config() -> CameraConfig {
        CameraConfig {
            device_range: 0..2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn discovers_existing_device_as_connected() {
        let probe = Arc::new(StubProbe::always_succeeds(&[0]));
        let monitor = Monitor::new(small_config(), probe, None);

        monitor.reconcile_once().await;

        let connected = monitor.get_connected_cameras();
        assert_eq!(connected.len(), 1);
        assert!(connected.contains_key(&Id::from_node_index(0)));
    }

    #[tokio::test]
    async fn emits_connected_event_exactly_once() {
        let probe = Arc::new(StubProbe::always_succeeds(&[0]));
        let monitor = Monitor::new(small_config(), probe, None);
        let mut receiver = monitor.add_event_callback(8);

        monitor.reconcile_once().await;
        monitor.reconcile_once().await;

        let first = receiver.try_recv().expect("expected a connected event");
        assert!(matches!(first, CameraEvent::Connected(_)));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_transition_emits_event_and_keeps_identity() {
        let probe = Arc::new(StubProbe::always_succeeds(&[0]));
        let monitor = Monitor::new(small_config(), probe.clone(), None);
        monitor.reconcile_once().await;

        probe.existing.lock().clear();
        let mut receiver = monitor.add_event_callback(8);
        monitor.reconcile_once().await;

        let event = receiver.try_recv().expect("expected a disconnected event");
        assert!(matches!(event, CameraEvent::Disconnected(_)));
        assert!(monitor.get_camera_by_id(Id::from_node_index(0)).is_some());
        assert!(monitor.get_connected_cameras().is_empty());
    }

    #[tokio::test]
    async fn persistent_probe_failure_transitions_to_error() {
        let probe = Arc::new(StubProbe::always_succeeds(&[0]));
        *probe.fail_until.lock() = 100;
        let config = CameraConfig {
            device_range: 0..1,
            probe_retries: 0,
            persistent_failure_threshold: 2,
            ..Default::default()
        };
        let monitor = Monitor::new(config, probe, None);

        monitor.reconcile_once().await;
        monitor.reconcile_once().await;

        let device = monitor
            .get_camera_by_id(Id::from_node_index(0))
            .expect("device tracked even though never probed successfully");
        assert_eq!(device.status, Status::Error);
        assert!(device.error_message.is_some());
    }

    #[tokio::test]
    async fn readiness_fires_after_first_sweep() {
        let probe = Arc::new(StubProbe::always_succeeds(&[]));
        let monitor = Monitor::new(small_config(), probe, None);
        let mut receiver = monitor.subscribe_to_readiness();
        assert!(!receiver.is_ready());

        monitor.reconcile_once().await;
        monitor.readiness.signal_ready();

        tokio::time::timeout(Duration::from_millis(50), receiver.wait())
            .await
            .expect("readiness should fire after the first sweep");
    }
}
