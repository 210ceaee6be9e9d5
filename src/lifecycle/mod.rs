//! Capture lifecycle management
//!
//! Every HTTP consumer holds a [`Lease`] for as long as it needs frames. The
//! first lease starts the capture engine; when the last one is dropped an
//! idle timer is armed, and the engine is stopped only if no new lease
//! arrives before it fires.
//!
//! ```text
//!  n_streams:   0 ──acquire──► 1 ──acquire──► 2 ──drop──► 1 ──drop──► 0
//!  engine:    idle  start()  active                               │
//!                                                   idle_timeout  ▼
//!                                         acquire? ◄──── timer pending
//!                                      (cancel, keep)        │ fire
//!                                                            ▼
//!                                                         stop() ─► idle
//! ```

pub mod error;
pub mod lease;
pub mod manager;
pub mod state;

pub use error::LifecycleError;
pub use lease::Lease;
pub use manager::StreamManager;
pub use state::{CaptureState, ManagerStats};
