//! Engine-to-core callback handle

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::broadcast::FrameBroadcaster;

/// Asynchronous notification from the capture engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Pipeline changed state (e.g. "ready" -> "playing")
    StateChanged { from: String, to: String },
    /// Recoverable problem worth logging
    Warning(String),
    /// Unrecoverable error; no further frames will be produced
    Fatal(String),
    /// Source ran dry
    EndOfStream,
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::StateChanged { from, to } => write!(f, "state {} -> {}", from, to),
            EngineEvent::Warning(msg) => write!(f, "warning: {}", msg),
            EngineEvent::Fatal(msg) => write!(f, "fatal: {}", msg),
            EngineEvent::EndOfStream => write!(f, "end of stream"),
        }
    }
}

/// Handle the engine uses to hand frames and events to the broadcaster
///
/// Cloneable and callable from any thread.
#[derive(Clone)]
pub struct FrameSink {
    broadcaster: Arc<FrameBroadcaster>,
}

impl FrameSink {
    pub fn new(broadcaster: Arc<FrameBroadcaster>) -> Self {
        Self { broadcaster }
    }

    /// Publish an encoded frame
    pub fn publish(&self, payload: impl Into<Bytes>, timestamp: Instant) -> Option<u64> {
        self.broadcaster.publish(payload, timestamp)
    }

    /// Log an engine event; fatal events fail the broadcaster
    pub fn report(&self, event: EngineEvent) {
        match &event {
            EngineEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Camera state changed");
            }
            EngineEvent::Warning(msg) => {
                tracing::warn!(message = %msg, "Camera warning");
            }
            EngineEvent::Fatal(msg) => {
                tracing::error!(message = %msg, "Camera failed");
                self.broadcaster.fail(msg.clone());
            }
            EngineEvent::EndOfStream => {
                tracing::error!("Camera reached end of stream");
                self.broadcaster.fail(event.to_string());
            }
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("stats", &self.broadcaster.stats())
            .finish()
    }
}
