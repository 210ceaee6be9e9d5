//! Broadcaster error types

/// Terminal signals returned by [`FrameBroadcaster::await_next`](super::FrameBroadcaster::await_next)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The capture engine reported an unrecoverable error; no frame will follow
    #[error("capture engine failed: {0}")]
    EngineFailed(String),
    /// The broadcaster was closed during shutdown
    #[error("frame broadcaster closed")]
    Closed,
}
