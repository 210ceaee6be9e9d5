//! Frame broadcaster implementation
//!
//! Single producer, many consumers, one slot. Built on `tokio::sync::watch`,
//! whose sender can be driven from any OS thread and whose receivers are
//! woken together on every change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::watch;

use super::error::BroadcastError;
use super::frame::Frame;

/// Whether the slot can still produce frames
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotStatus {
    Running,
    Failed(String),
    Closed,
}

/// Shared state behind the watch channel
#[derive(Debug)]
struct SlotState {
    /// Most recent frame, `None` until the first publish
    latest: Option<Frame>,
    /// Sequence number the next published frame receives
    next_sequence: u64,
    status: SlotStatus,
}

impl SlotState {
    fn check_status(&self) -> Result<(), BroadcastError> {
        match &self.status {
            SlotStatus::Running => Ok(()),
            SlotStatus::Failed(reason) => Err(BroadcastError::EngineFailed(reason.clone())),
            SlotStatus::Closed => Err(BroadcastError::Closed),
        }
    }

    fn is_running(&self) -> bool {
        self.status == SlotStatus::Running
    }

    /// Whether the current frame is newer than `threshold`
    ///
    /// A `None` threshold (nothing published yet) is satisfied by any frame.
    fn is_newer_than(&self, threshold: Option<u64>) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|frame| threshold.map_or(true, |seen| frame.sequence > seen))
    }
}

/// Broadcaster-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastStats {
    /// Frames accepted by `publish` since creation
    pub frames_published: u64,
    /// Frames consumers reported as skipped
    pub frames_dropped: u64,
    /// Consumers currently suspended in `await_next`
    pub waiting_consumers: usize,
    /// Sequence of the current frame
    pub last_sequence: Option<u64>,
}

/// Latest-frame slot with broadcast wake-up
///
/// `publish` is called from the capture thread, `await_next` from any number
/// of async consumers. Thread-safe; share it behind an `Arc`.
pub struct FrameBroadcaster {
    tx: watch::Sender<SlotState>,
    frames_dropped: AtomicU64,
}

impl FrameBroadcaster {
    /// Create an empty broadcaster; no frame has been published yet
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SlotState {
            latest: None,
            next_sequence: 0,
            status: SlotStatus::Running,
        });

        Self {
            tx,
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Replace the current frame and wake every waiting consumer
    ///
    /// Never blocks on consumers. Returns the assigned sequence number, or
    /// `None` if the frame was discarded because the broadcaster is failed
    /// or closed.
    pub fn publish(&self, payload: impl Into<Bytes>, timestamp: Instant) -> Option<u64> {
        let payload = payload.into();
        let mut assigned = None;

        self.tx.send_if_modified(|slot| {
            if !slot.is_running() {
                return false;
            }
            let sequence = slot.next_sequence;
            slot.next_sequence += 1;
            slot.latest = Some(Frame::new(sequence, payload, timestamp));
            assigned = Some(sequence);
            true
        });

        if assigned.is_none() {
            tracing::trace!("Frame discarded, broadcaster not running");
        }
        assigned
    }

    /// Wait for a frame newer than `since`
    ///
    /// - Nothing published yet: waits for the first frame.
    /// - `since` older than the current frame: returns the current frame
    ///   immediately.
    /// - Otherwise (including `since == None`): waits for the next publish.
    ///
    /// Cancel-safe. Returns an error once the engine has failed or the
    /// broadcaster has been closed, including for callers already waiting.
    pub async fn await_next(&self, since: Option<u64>) -> Result<Frame, BroadcastError> {
        let mut rx = self.tx.subscribe();

        let threshold = {
            let slot = rx.borrow_and_update();
            slot.check_status()?;
            match (since, slot.latest.as_ref()) {
                (Some(seen), Some(latest)) if seen < latest.sequence => {
                    return Ok(latest.clone());
                }
                // Anything published after this point is "next"
                (_, latest) => latest.map(|frame| frame.sequence),
            }
        };

        let slot = rx
            .wait_for(|slot| !slot.is_running() || slot.is_newer_than(threshold))
            .await
            .map_err(|_| BroadcastError::Closed)?;

        slot.check_status()?;
        slot.latest.clone().ok_or(BroadcastError::Closed)
    }

    /// Mark the capture engine as failed
    ///
    /// Every pending and future `await_next` returns
    /// [`BroadcastError::EngineFailed`] until [`recover`](Self::recover).
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|slot| {
            if slot.status != SlotStatus::Running {
                return false;
            }
            tracing::warn!(reason = %reason, "Frame broadcaster failed");
            slot.status = SlotStatus::Failed(reason);
            true
        });
    }

    /// Clear a previous failure after the engine was restarted
    ///
    /// The sequence counter continues where it left off.
    pub fn recover(&self) {
        self.tx.send_if_modified(|slot| {
            if matches!(slot.status, SlotStatus::Failed(_)) {
                slot.status = SlotStatus::Running;
                tracing::info!("Frame broadcaster recovered");
            }
            false
        });
    }

    /// Close the broadcaster permanently
    pub fn close(&self) {
        self.tx.send_if_modified(|slot| {
            if slot.status == SlotStatus::Closed {
                return false;
            }
            slot.status = SlotStatus::Closed;
            true
        });
    }

    /// Whether the engine failure flag is set
    pub fn is_failed(&self) -> bool {
        matches!(self.tx.borrow().status, SlotStatus::Failed(_))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.borrow().status == SlotStatus::Closed
    }

    /// Add consumer-observed skipped frames to the aggregate counter
    pub fn record_dropped(&self, gap: u64) {
        if gap > 0 {
            self.frames_dropped.fetch_add(gap, Ordering::Relaxed);
        }
    }

    /// Snapshot of broadcaster counters
    pub fn stats(&self) -> BroadcastStats {
        let slot = self.tx.borrow();
        BroadcastStats {
            frames_published: slot.next_sequence,
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            waiting_consumers: self.tx.receiver_count(),
            last_sequence: slot.latest.as_ref().map(|frame| frame.sequence),
        }
    }
}

impl Default for FrameBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
