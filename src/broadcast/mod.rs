//! Latest-frame broadcast from the capture thread to HTTP consumers
//!
//! The broadcaster holds exactly one "current" frame. The capture engine
//! publishes into it from its own thread; any number of consumer tasks wait
//! for a frame newer than the one they last saw.
//!
//! # Architecture
//!
//! ```text
//!   capture thread                 Arc<FrameBroadcaster>
//!  ┌──────────────┐          ┌───────────────────────────┐
//!  │ FrameSink    │ publish  │ watch::Sender<SlotState>  │
//!  │  .publish()  ├─────────►│   latest: Option<Frame>   │
//!  └──────────────┘          │   next_sequence: u64      │
//!                            │   status: Running/Failed  │
//!                            └─────────────┬─────────────┘
//!                 ┌────────────────────────┼────────────────────────┐
//!                 ▼                        ▼                        ▼
//!          await_next(None)        await_next(Some(41))     await_next(Some(42))
//!            /snapshot                 /stream                  /stream
//! ```
//!
//! There is no queue: a slow consumer skips frames instead of delaying the
//! producer, and learns how many it skipped from [`Frame::gap_since`].
//!
//! `bytes::Bytes` is reference counted, so every consumer shares the same
//! JPEG allocation.

pub mod broadcaster;
pub mod error;
pub mod frame;

pub use broadcaster::{BroadcastStats, FrameBroadcaster};
pub use error::BroadcastError;
pub use frame::Frame;
