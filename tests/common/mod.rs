// Shared end-to-end harness: assembles a real `AppState` and runs the
// WebSocket front door against an ephemeral port, the way `app::run` does
// minus the `ctrl_c` wait. The media engine is whatever `MediaMtxConfig`
// points at — callers wire it to a `wiremock::MockServer` when the
// scenario needs one, or leave it pointed nowhere when it doesn't.

use async_trait::async_trait;
use camera_orchestrator::{
    auth::{ClientRateLimiter, PermissionMatrix, TokenService},
    camera::{CapabilityProbe, Monitor, V4L2Capabilities},
    config::Config,
    error::ServiceError,
    events::Bus,
    health::HealthApi,
    mediamtx::Controller,
    recording::RecordingManager,
    rpc::{dispatch::AppState, server, ConnectionRegistry},
    snapshot::SnapshotManager,
    util::{async_flag, runtime::Runnable},
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex as StdMutex;
use serde_json::{json, Value};
use std::{
    collections::HashSet,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Toggleable camera presence, standing in for `v4l2-ctl` the way
/// `camera::monitor`'s own in-crate stub does, rewritten here since that
/// one is private to the crate's test module.
pub struct StubProbe {
    present: StdMutex<HashSet<PathBuf>>,
    capabilities: V4L2Capabilities,
}
impl StubProbe {
    pub fn new(present: &[u32]) -> Self {
        Self {
            present: StdMutex::new(present.iter().map(|index| node_path(*index)).collect()),
            capabilities: V4L2Capabilities {
                driver: "uvcvideo".to_owned(),
                card: "Test Cam".to_owned(),
                bus_info: "usb-0".to_owned(),
                capability_flags: vec!["Video Capture".to_owned()],
                formats: vec![],
            },
        }
    }

    pub fn plug_in(
        &self,
        index: u32,
    ) {
        self.present.lock().insert(node_path(index));
    }

    pub fn unplug(
        &self,
        index: u32,
    ) {
        self.present.lock().remove(&node_path(index));
    }
}
#[async_trait]
impl CapabilityProbe for StubProbe {
    async fn node_exists(
        &self,
        path: &Path,
    ) -> bool {
        self.present.lock().contains(path)
    }
    async fn probe(
        &self,
        _path: &Path,
        _timeout: Duration,
    ) -> Result<V4L2Capabilities, ServiceError> {
        Ok(self.capabilities.clone())
    }
}
fn node_path(index: u32) -> PathBuf {
    PathBuf::from(format!("/dev/video{index}"))
}

pub struct Harness {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: async_flag::Sender,
    server_task: tokio::task::JoinHandle<Result<(), camera_orchestrator::error::ServiceError>>,
    monitor_task: tokio::task::JoinHandle<()>,
}

impl Harness {
    pub async fn shutdown(self) {
        self.shutdown.signal();
        let _ = self.server_task.await;
        let _ = self.monitor_task.await;
    }

    pub async fn connect(&self) -> WsClient {
        let url = format!("ws://{}{}", self.addr, self.state.config.server.websocket_path);
        // the accept loop starts serving as soon as the bind succeeds, but
        // leaves a short window before the first `accept()` is polled.
        for attempt in 0.. {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => return WsClient { stream, next_id: 1 },
                Err(error) if attempt < 20 => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let _ = error;
                }
                Err(error) => panic!("failed to connect to test harness server: {error}"),
            }
        }
        unreachable!()
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}
impl WsClient {
    /// Sends a request and waits for its matching response, skipping over
    /// ping/pong frames and any broadcast event frames that arrive first.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
    ) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let request = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": id });
        self.stream.send(Message::Text(request.to_string())).await.expect("send request");

        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("response timed out")
                .expect("stream closed before a response arrived")
                .expect("websocket frame error");
            let Message::Text(text) = frame else { continue };
            let value: Value = serde_json::from_str(&text).expect("response is valid json");
            if value.get("id").and_then(Value::as_u64) == Some(id) {
                return value;
            }
            // not our response (an event envelope, most likely) — keep waiting.
        }
    }

    pub async fn authenticate(
        &mut self,
        token: &str,
    ) -> Value {
        self.call("authenticate", json!({ "auth_token": token })).await
    }
}

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Builds the full subsystem graph the way `app::run` does and starts the
/// RPC server in the background, bound to an ephemeral port.
pub async fn spawn(
    mut config: Config,
    probe: Arc<dyn CapabilityProbe>,
) -> Harness {
    config.server.host = "127.0.0.1".to_owned();
    config.server.port = free_port().await;
    // keepalive pings have no place firing mid-assertion in a short test.
    config.server.ping_interval = Duration::from_secs(300).into();
    config.server.pong_wait = Duration::from_secs(300).into();

    let bus = Arc::new(Bus::new());
    let monitor = Arc::new(Monitor::new(config.camera.clone(), probe, Some(Arc::clone(&bus))));
    let controller = Arc::new(
        Controller::with_bus(&config.mediamtx, monitor.subscribe_to_readiness(), Some(Arc::clone(&bus)))
            .expect("mediamtx controller"),
    );
    let recording = Arc::new(RecordingManager::new(
        config.recording.clone(),
        Arc::clone(&controller) as Arc<dyn camera_orchestrator::recording::RecordingEngine>,
        Arc::clone(&monitor) as Arc<dyn camera_orchestrator::recording::DeviceLookup>,
        Some(Arc::clone(&bus)),
    ));
    let snapshot = Arc::new(SnapshotManager::new(
        config.snapshots.clone(),
        config.ffmpeg.binary_path.clone(),
        Arc::clone(&controller) as Arc<dyn camera_orchestrator::snapshot::SnapshotEngine>,
        Arc::clone(&monitor) as Arc<dyn camera_orchestrator::snapshot::DeviceNodeLookup>,
        Some(Arc::clone(&bus)),
    ));
    controller.attach_recording_manager(Arc::clone(&recording));
    controller.attach_snapshot_manager(Arc::clone(&snapshot));

    let tokens = Arc::new(TokenService::new(&config.security.jwt_secret, config.security.token_ttl.into()));
    let permissions = Arc::new(PermissionMatrix::new(&config.security.permissions));
    let rate_limiter = Arc::new(ClientRateLimiter::new(
        config.security.rate_limit_requests,
        config.security.rate_limit_window.into(),
        config.security.rate_limit_inactive_ttl.into(),
    ));
    let health = Arc::new(HealthApi::new(
        Arc::clone(&monitor),
        Arc::clone(&controller),
        Arc::clone(&recording),
        Arc::clone(&snapshot),
    ));
    let connections = Arc::new(ConnectionRegistry::new());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse().unwrap();
    let retention_policy = parking_lot::Mutex::new(config.retention_policy.clone());
    let server_config = config.server.clone();
    let monitor_for_state = Arc::clone(&monitor);
    let state = Arc::new(AppState {
        config: Arc::new(config),
        monitor: monitor_for_state,
        controller,
        recording,
        snapshot,
        bus,
        tokens,
        permissions,
        rate_limiter,
        health,
        connections,
        retention_policy,
    });

    let (shutdown_tx, shutdown_rx) = async_flag::pair();
    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let exit_flag = shutdown_rx.clone();
        async move {
            monitor.run(exit_flag).await;
        }
    });
    let server_task = tokio::spawn(server::run(server_config, Arc::clone(&state), shutdown_rx));

    Harness { addr, state, shutdown: shutdown_tx, server_task, monitor_task }
}
