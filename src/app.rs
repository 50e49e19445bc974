// Process wiring.
//
// Constructs every subsystem, assembles them into the shared `AppState`,
// and runs the WebSocket front door alongside the camera monitor's
// reconciliation loop and the rate limiter's sweeper until `ctrl_c`.
// Shutdown is cooperative: one `async_flag` pair signals all three, and
// `run` only returns once every spawned task has joined.

use crate::{
    auth::{ClientRateLimiter, PermissionMatrix, TokenService},
    camera::{CommandCapabilityProbe, Monitor},
    config::Config,
    events::{Bus, Topic},
    health::HealthApi,
    mediamtx::Controller,
    recording::RecordingManager,
    rpc::{dispatch::AppState, server},
    snapshot::SnapshotManager,
    util::{async_flag, runtime::Runnable},
};
use anyhow::Context;
use futures::{future::FutureExt, select};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;

/// Tries the engine's config endpoint immediately and, on failure, keeps
/// retrying on `retry_delay` until it succeeds or the process is shutting
/// down. A successful fetch is what flips `Controller::recheck_readiness`'s
/// `config_fetched` gate, so this is the one call in the whole service that
/// makes `Controller::is_ready()` reachable outside of tests.
async fn fetch_engine_config_until_ready(
    controller: Arc<Controller>,
    retry_delay: Duration,
    mut exit_flag: async_flag::Receiver,
) {
    loop {
        match controller.get_config(&CancellationToken::new()).await {
            Ok(_) => break,
            Err(error) => {
                log::warn!("failed to fetch mediamtx config, retrying: {error}");
                select! {
                    () = tokio::time::sleep(retry_delay).fuse() => {},
                    () = &mut exit_flag => break,
                }
            }
        }
    }
}

pub async fn run(config: Config) -> Result<(), anyhow::Error> {
    config.validate().context("validate")?;

    let bus = Arc::new(Bus::new());

    let probe = Arc::new(CommandCapabilityProbe::new(config.camera.capability_command.clone().into()));
    let monitor = Arc::new(Monitor::new(config.camera.clone(), probe, Some(Arc::clone(&bus))));

    let controller = Arc::new(
        Controller::with_bus(&config.mediamtx, monitor.subscribe_to_readiness(), Some(Arc::clone(&bus)))
            .context("mediamtx controller")?,
    );

    let recording = Arc::new(RecordingManager::new(
        config.recording.clone(),
        Arc::clone(&controller) as Arc<dyn crate::recording::RecordingEngine>,
        Arc::clone(&monitor) as Arc<dyn crate::recording::DeviceLookup>,
        Some(Arc::clone(&bus)),
    ));
    let snapshot = Arc::new(SnapshotManager::new(
        config.snapshots.clone(),
        config.ffmpeg.binary_path.clone(),
        Arc::clone(&controller) as Arc<dyn crate::snapshot::SnapshotEngine>,
        Arc::clone(&monitor) as Arc<dyn crate::snapshot::DeviceNodeLookup>,
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
    let connections = Arc::new(crate::rpc::ConnectionRegistry::new());

    let retention_policy = Mutex::new(config.retention_policy.clone());
    let config_retry_delay: Duration = config.mediamtx.retry_base_delay.into();
    let server_config = config.server.clone();
    let state = Arc::new(AppState {
        config: Arc::new(config),
        monitor: Arc::clone(&monitor),
        controller,
        recording,
        snapshot,
        bus,
        tokens,
        permissions,
        rate_limiter: Arc::clone(&rate_limiter),
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
    let rate_limiter_task = tokio::spawn({
        let exit_flag = shutdown_rx.clone();
        async move {
            rate_limiter.run(exit_flag).await;
        }
    });
    let server_task = tokio::spawn(server::run(server_config, Arc::clone(&state), shutdown_rx.clone()));
    let config_fetch_task = tokio::spawn(fetch_engine_config_until_ready(
        Arc::clone(&state.controller),
        config_retry_delay,
        shutdown_rx,
    ));

    state.bus.publish(Topic::SystemStartup, serde_json::json!({}));
    log::info!("camera-orchestrator started, awaiting exit signal");
    ctrl_c().await.context("ctrlc")?;
    log::info!("received exit signal, shutting down");

    shutdown_tx.signal();

    for result in state.recording.stop_all().await {
        if let Err(error) = result {
            log::warn!("failed to stop recording session during shutdown: {error}");
        }
    }
    state.bus.publish(Topic::SystemShutdown, serde_json::json!({}));

    let (monitor_result, rate_limiter_result, server_result, config_fetch_result) =
        tokio::join!(monitor_task, rate_limiter_task, server_task, config_fetch_task);
    monitor_result.context("monitor task panicked")?;
    rate_limiter_result.context("rate limiter task panicked")?;
    server_result.context("rpc server task panicked")?.context("rpc server")?;
    config_fetch_result.context("config fetch task panicked")?;

    Ok(())
}
