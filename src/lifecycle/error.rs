//! Lifecycle error types

use crate::engine::EngineError;

/// Error type for lease and engine lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The capture engine could not be started for this lease
    #[error(transparent)]
    Start(EngineError),
    /// Final engine teardown failed
    #[error(transparent)]
    Shutdown(EngineError),
    /// The manager has been shut down and no longer hands out leases
    #[error("stream manager is shut down")]
    Closed,
}
