use camera_orchestrator::{
    app,
    config::Config,
    util::logging,
};
use clap::Parser;

/// Camera orchestration service: WebSocket JSON-RPC front door over an
/// RTSP/HLS/WebRTC media engine.
///
/// Configuration file/environment loading is out of scope; these flags only
/// override the handful of settings that matter to get a process up, the
/// rest come from `Config::default()`.
#[derive(Parser, Debug)]
#[command(name = "camera-orchestrator", version, about)]
struct Cli {
    /// Address the WebSocket server binds to.
    #[arg(long, env = "CAMERA_ORCHESTRATOR_HOST")]
    host: Option<String>,

    /// Port the WebSocket server binds to.
    #[arg(long, env = "CAMERA_ORCHESTRATOR_PORT")]
    port: Option<u16>,

    /// Base URL of the mediamtx instance this process controls.
    #[arg(long, env = "CAMERA_ORCHESTRATOR_MEDIAMTX_URL")]
    mediamtx_url: Option<String>,

    /// Secret used to sign and validate bearer tokens.
    #[arg(long, env = "CAMERA_ORCHESTRATOR_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Enable tracing-level module filtering in the logger.
    #[arg(long)]
    tracing: bool,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    logging::configure("camera_orchestrator", cli.tracing);

    let mut config = Config::default();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(mediamtx_url) = cli.mediamtx_url {
        config.mediamtx.base_url = mediamtx_url;
    }
    if let Some(jwt_secret) = cli.jwt_secret {
        config.security.jwt_secret = jwt_secret;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("camera-orchestrator.runtime")
        .build()?;

    log::info!("camera-orchestrator starting");
    let result = runtime.block_on(app::run(config));
    log::info!("camera-orchestrator closed");

    result
}
