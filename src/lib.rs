//! On-demand camera server
//!
//! Serves JPEG snapshots and an MJPEG stream over HTTP. The camera is only
//! running while at least one client is watching, plus a configurable idle
//! timeout after the last one leaves.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rockcam::broadcast::FrameBroadcaster;
//! use rockcam::engine::{self, FrameSink};
//! use rockcam::lifecycle::StreamManager;
//! use rockcam::{CameraServer, Config, ServerConfig};
//!
//! # async fn run() -> rockcam::Result<()> {
//! let config = Config::default();
//! let broadcaster = Arc::new(FrameBroadcaster::new());
//! let engine = engine::build(&config, FrameSink::new(Arc::clone(&broadcaster)))?;
//! let manager = StreamManager::new(engine, broadcaster, config.pipeline.idle_timeout_duration());
//!
//! let server = CameraServer::new(ServerConfig::default(), manager);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use server::{CameraServer, ServerConfig};
