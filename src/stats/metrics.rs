//! Per-consumer delivery statistics

use std::time::{Duration, Instant};

/// Counters for one streaming consumer
#[derive(Debug, Clone)]
pub struct ConsumerStats {
    /// When the consumer started
    pub started_at: Instant,
    /// Frames written to the consumer
    pub frames_sent: u64,
    /// Frames published but skipped because the consumer was busy
    pub frames_dropped: u64,
    /// JPEG bytes written (excluding multipart headers)
    pub bytes_sent: u64,
}

impl ConsumerStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_sent: 0,
            frames_dropped: 0,
            bytes_sent: 0,
        }
    }

    /// Account for one delivered frame and the gap before it
    pub fn record_frame(&mut self, bytes: usize, gap: u64) {
        self.frames_sent += 1;
        self.frames_dropped += gap;
        self.bytes_sent += bytes as u64;
    }

    /// Time since the consumer started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Delivered frames per second
    pub fn framerate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Fraction of published frames this consumer skipped
    pub fn drop_ratio(&self) -> f64 {
        let total = self.frames_sent + self.frames_dropped;
        if total > 0 {
            self.frames_dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}

impl Default for ConsumerStats {
    fn default() -> Self {
        Self::new()
    }
}
