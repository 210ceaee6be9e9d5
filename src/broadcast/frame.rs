//! Encoded frame type shared with consumers

use std::time::Instant;

use bytes::Bytes;

/// One encoded JPEG image as published by the capture engine
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the publish order, starting at 0 and never skipping
    pub sequence: u64,
    /// JPEG data
    pub payload: Bytes,
    /// Monotonic capture time
    pub timestamp: Instant,
}

impl Frame {
    pub(super) fn new(sequence: u64, payload: Bytes, timestamp: Instant) -> Self {
        Self {
            sequence,
            payload,
            timestamp,
        }
    }

    /// Number of frames published between `since` and this frame
    ///
    /// Returns 0 when the caller has not seen a frame yet.
    pub fn gap_since(&self, since: Option<u64>) -> u64 {
        match since {
            Some(last) => self.sequence.saturating_sub(last).saturating_sub(1),
            None => 0,
        }
    }

    /// Size of the JPEG payload in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
