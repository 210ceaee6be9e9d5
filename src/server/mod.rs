//! HTTP server
//!
//! Serves single snapshots, the MJPEG stream and the static viewer page on
//! top of a [`StreamManager`](crate::lifecycle::StreamManager).

pub mod config;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod multipart;

pub use config::ServerConfig;
pub use error::ServerError;
pub use handlers::router;
pub use listener::CameraServer;
