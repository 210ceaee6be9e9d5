//! HTTP endpoints
//!
//! - `GET /snapshot`: one fresh JPEG
//! - `GET /stream`: endless `multipart/x-mixed-replace` JPEG stream
//! - `GET /stats`: lifecycle and broadcaster counters as JSON
//! - anything else: static files from the www directory

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures::Stream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::multipart;
use crate::broadcast::{BroadcastError, FrameBroadcaster};
use crate::lifecycle::{Lease, ManagerStats, StreamManager};
use crate::stats::ConsumerStats;

const NO_CACHE: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

#[derive(Clone)]
struct AppState {
    manager: StreamManager,
}

/// Build the application router
pub fn router(manager: StreamManager, www_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/stream", get(stream))
        .route("/stats", get(stats))
        .fallback_service(ServeDir::new(www_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { manager })
}

async fn snapshot(State(state): State<AppState>) -> Result<Response, ServerError> {
    let lease = state.manager.acquire().await?;
    let frame = state.manager.broadcaster().await_next(None).await?;

    tracing::debug!(
        lease_id = lease.id(),
        sequence = frame.sequence,
        bytes = frame.len(),
        "Snapshot served"
    );
    drop(lease);

    Ok((
        [(header::CONTENT_TYPE, "image/jpeg")],
        NO_CACHE,
        frame.payload,
    )
        .into_response())
}

async fn stream(State(state): State<AppState>) -> Result<Response, ServerError> {
    let lease = state.manager.acquire().await?;
    tracing::info!(lease_id = lease.id(), "Stream opened");

    let session = StreamSession::new(lease, Arc::clone(state.manager.broadcaster()));
    let body = Body::from_stream(session.into_parts());

    Ok((
        [(header::CONTENT_TYPE, multipart::CONTENT_TYPE)],
        NO_CACHE,
        body,
    )
        .into_response())
}

async fn stats(State(state): State<AppState>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

/// One `/stream` consumer
///
/// Owned by the response body, so a client disconnect drops it together
/// with its lease.
struct StreamSession {
    lease: Lease,
    broadcaster: Arc<FrameBroadcaster>,
    last_sequence: Option<u64>,
    stats: ConsumerStats,
    finished: bool,
}

impl StreamSession {
    fn new(lease: Lease, broadcaster: Arc<FrameBroadcaster>) -> Self {
        Self {
            lease,
            broadcaster,
            last_sequence: None,
            stats: ConsumerStats::new(),
            finished: false,
        }
    }

    /// Next body chunk, `None` once the stream has ended
    async fn next_part(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }

        match self.broadcaster.await_next(self.last_sequence).await {
            Ok(frame) => {
                let gap = frame.gap_since(self.last_sequence);
                if gap > 0 {
                    tracing::info!(
                        lease_id = self.lease.id(),
                        dropped = gap,
                        sequence = frame.sequence,
                        "Dropped frames"
                    );
                    self.broadcaster.record_dropped(gap);
                }

                self.stats.record_frame(frame.len(), gap);
                self.last_sequence = Some(frame.sequence);
                Some(multipart::encode_part(&frame))
            }
            Err(e) => {
                match &e {
                    BroadcastError::EngineFailed(_) => {
                        tracing::error!(lease_id = self.lease.id(), error = %e, "Ending stream");
                    }
                    BroadcastError::Closed => {
                        tracing::info!(lease_id = self.lease.id(), "Ending stream, server shutting down");
                    }
                }
                self.finished = true;
                Some(Bytes::from_static(multipart::TERMINATOR))
            }
        }
    }

    fn into_parts(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let part = session.next_part().await?;
            Some((Ok(part), session))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        tracing::info!(
            lease_id = self.lease.id(),
            frames_sent = self.stats.frames_sent,
            frames_dropped = self.stats.frames_dropped,
            bytes_sent = self.stats.bytes_sent,
            duration_ms = self.stats.duration().as_millis() as u64,
            framerate = self.stats.framerate(),
            drop_ratio = self.stats.drop_ratio(),
            "Stream closed"
        );
    }
}
