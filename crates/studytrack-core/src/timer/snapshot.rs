//! Immutable timer snapshots.

use serde::{Deserialize, Serialize};

/// Phase of the session timer.
///
/// There is no resting `Stopped` phase: STOP finalizes and resets straight
/// back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

/// Read-only view of the timer at a point in time.
///
/// Published on every tick and every phase transition. Within a single
/// running/paused span, `elapsed_secs` never decreases from one snapshot to
/// the next; it drops back to 0 only when the timer returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub elapsed_secs: u64,
}

impl TimerSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: TimerPhase::Idle,
            elapsed_secs: 0,
        }
    }

    pub fn hours(&self) -> u64 {
        self.elapsed_secs / 3600
    }

    pub fn minutes(&self) -> u64 {
        (self.elapsed_secs % 3600) / 60
    }

    pub fn seconds(&self) -> u64 {
        self.elapsed_secs % 60
    }

    /// Elapsed time as "HH:MM:SS" for display surfaces.
    pub fn hms(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
