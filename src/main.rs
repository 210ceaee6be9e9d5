//! rockcam: camera snapshot and MJPEG streaming server
//!
//! Run with: rockcam [--host ADDR] [--port PORT] [--config FILE] [--www DIR]
//!
//! Endpoints:
//!   GET /snapshot   single JPEG
//!   GET /stream     multipart/x-mixed-replace MJPEG
//!   GET /stats      lifecycle counters as JSON
//!   GET /           static viewer page

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rockcam::broadcast::FrameBroadcaster;
use rockcam::engine::{self, FrameSink};
use rockcam::lifecycle::StreamManager;
use rockcam::{CameraServer, Config, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "rockcam", version, about = "Camera snapshot and MJPEG streaming server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "ROCKCAM_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "ROCKCAM_PORT", default_value_t = rockcam::server::config::DEFAULT_PORT)]
    port: u16,

    /// TOML configuration file
    #[arg(long, env = "ROCKCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with the static viewer page
    #[arg(long, env = "ROCKCAM_WWW", default_value = "www")]
    www: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rockcam=info".parse()?)
                .add_directive("tower_http=warn".parse()?),
        )
        .init();

    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };
    tracing::debug!(?config, "Configuration");

    let broadcaster = Arc::new(FrameBroadcaster::new());
    let engine = engine::build(&config, FrameSink::new(Arc::clone(&broadcaster)))?;
    let manager = StreamManager::new(
        engine,
        broadcaster,
        config.pipeline.idle_timeout_duration(),
    );

    let server_config = ServerConfig::with_addr(SocketAddr::new(args.host, args.port))
        .www_dir(args.www);
    let server = CameraServer::new(server_config, manager);

    server.run_until(shutdown_signal()).await?;

    let stats = server.manager().stats();
    tracing::info!(
        frames_published = stats.broadcast.frames_published,
        frames_dropped = stats.broadcast.frames_dropped,
        "Exiting"
    );
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
