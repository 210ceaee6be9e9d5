//! Camera HTTP server listener
//!
//! Binds the TCP socket, serves the router and performs the ordered
//! shutdown: stop accepting, release the camera, then let in-flight
//! responses finish.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::lifecycle::StreamManager;
use crate::server::config::ServerConfig;
use crate::server::handlers;

/// Camera server
pub struct CameraServer {
    config: ServerConfig,
    manager: StreamManager,
}

impl CameraServer {
    /// Create a new server with the given configuration and stream manager
    pub fn new(config: ServerConfig, manager: StreamManager) -> Self {
        Self { config, manager }
    }

    /// Get a reference to the stream manager
    pub fn manager(&self) -> &StreamManager {
        &self.manager
    }

    /// Application router
    pub fn router(&self) -> Router {
        handlers::router(self.manager.clone(), &self.config.www_dir)
    }

    /// Run the server with graceful shutdown
    ///
    /// Returns once `shutdown` resolves and the engine has been shut down.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            www = %self.config.www_dir.display(),
            idle_timeout_ms = self.manager.idle_timeout().as_millis() as u64,
            "Camera server listening"
        );

        let manager = self.manager.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                // Wakes every open stream so the graceful drain can complete
                if let Err(e) = manager.shutdown().await {
                    tracing::error!(error = %e, "Engine shutdown failed");
                }
            })
            .await;

        // No-op after a graceful exit; covers a failed accept loop
        if let Err(e) = self.manager.shutdown().await {
            tracing::error!(error = %e, "Engine shutdown failed");
        }

        tracing::info!("Camera server stopped");
        result.map_err(Into::into)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
