//! Capture state and lifecycle statistics

use serde::Serialize;

use crate::broadcast::BroadcastStats;

/// Whether the capture engine is producing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// Engine stopped, device resources minimized
    Idle,
    /// Engine producing frames (leases held, or idle timer still pending)
    Active,
}

/// Lifecycle and broadcast counters, as served on `/stats`
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Live leases
    pub n_streams: usize,
    pub capture_state: CaptureState,
    /// Whether an idle-stop timer is armed
    pub idle_timer_pending: bool,
    #[serde(flatten)]
    pub broadcast: BroadcastStats,
}
