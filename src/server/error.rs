//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::broadcast::BroadcastError;
use crate::lifecycle::LifecycleError;

/// Failure while serving `/snapshot` or opening `/stream`
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}

impl ServerError {
    /// Status code reported to the client
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Lifecycle(LifecycleError::Start(_))
            | ServerError::Lifecycle(LifecycleError::Shutdown(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Lifecycle(LifecycleError::Closed) | ServerError::Broadcast(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        (status, self.to_string()).into_response()
    }
}
