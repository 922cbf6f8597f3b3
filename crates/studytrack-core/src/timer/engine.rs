//! Timer engine implementation.
//!
//! The timer engine is a tick-driven state machine. It does not use internal
//! threads and never reads a clock - the caller supplies the current instant
//! with every command or tick, which keeps the engine fully deterministic.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!          |  ^          |
//!          +--+-- stop/cancel -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.apply(Command::Start, clock.now());
//! // Once per second while running:
//! engine.tick(clock.now());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::{TimerPhase, TimerSnapshot};

/// Command issued by a bound client.
///
/// Commands carry no payload; the active subject is set separately on the
/// service handle before the session is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Begin from `Idle`, or resume from `Paused`.
    Start,
    Pause,
    /// Finalize: record the session if any time accrued, then reset.
    Stop,
    /// Discard without recording, then reset.
    Cancel,
}

/// A finalized session, handed to the session recorder exactly once.
///
/// Created only on a successful `Stop` from `Running`/`Paused` with elapsed
/// time greater than zero. Never created on `Cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub subject_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Result of applying a command.
///
/// `applied == false` means the command was a no-op for the current phase
/// (e.g. `Pause` while `Idle`). That is a valid outcome, not an error.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub applied: bool,
    pub snapshot: TimerSnapshot,
    pub completed: Option<CompletedSession>,
}

/// Core session timer state machine.
///
/// All mutation goes through [`TimerEngine::apply`] and [`TimerEngine::tick`];
/// the owning service serializes those calls, so the engine itself needs no
/// interior locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    phase: TimerPhase,
    elapsed_secs: u64,
    subject_id: Option<i64>,
    /// Stamped when the session leaves `Idle`; cleared on reset.
    started_at: Option<DateTime<Utc>>,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            elapsed_secs: 0,
            subject_id: None,
            started_at: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn subject_id(&self) -> Option<i64> {
        self.subject_id
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            elapsed_secs: self.elapsed_secs,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set the subject the next completed session is attributed to.
    ///
    /// May be changed at any time; the value held at `Stop` is what gets
    /// recorded.
    pub fn set_subject(&mut self, subject_id: Option<i64>) {
        self.subject_id = subject_id;
    }

    /// Apply a command, returning the resulting snapshot and any finalized
    /// session. The single serialized entry point for all mutation.
    pub fn apply(&mut self, cmd: Command, now: DateTime<Utc>) -> CommandOutcome {
        let (applied, completed) = match cmd {
            Command::Start => (self.start(now), None),
            Command::Pause => (self.pause(), None),
            Command::Stop => self.stop(),
            Command::Cancel => (self.cancel(), None),
        };
        CommandOutcome {
            applied,
            snapshot: self.snapshot(),
            completed,
        }
    }

    /// Advance elapsed time by one second. No-op unless `Running`.
    ///
    /// Returns `true` if the tick advanced the counter. Ticks delivered while
    /// `Idle` or `Paused` are idempotent no-ops, never errors.
    pub fn tick(&mut self) -> bool {
        match self.phase {
            TimerPhase::Running => {
                self.elapsed_secs += 1;
                true
            }
            _ => false,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            TimerPhase::Idle => {
                self.phase = TimerPhase::Running;
                self.elapsed_secs = 0;
                self.started_at = Some(now);
                true
            }
            // Resume from the frozen value.
            TimerPhase::Paused => {
                self.phase = TimerPhase::Running;
                true
            }
            TimerPhase::Running => false, // Already running.
        }
    }

    fn pause(&mut self) -> bool {
        match self.phase {
            TimerPhase::Running => {
                self.phase = TimerPhase::Paused;
                true
            }
            _ => false,
        }
    }

    /// Stop from `Idle` is a successful no-op so clients can double-tap stop.
    fn stop(&mut self) -> (bool, Option<CompletedSession>) {
        match self.phase {
            TimerPhase::Running | TimerPhase::Paused => {
                let completed = if self.elapsed_secs > 0 {
                    Some(CompletedSession {
                        subject_id: self.subject_id,
                        // Running/Paused implies a start stamp exists.
                        started_at: self.started_at.unwrap_or_default(),
                        duration_secs: self.elapsed_secs,
                    })
                } else {
                    None
                };
                self.reset();
                (true, completed)
            }
            TimerPhase::Idle => (false, None),
        }
    }

    fn cancel(&mut self) -> bool {
        match self.phase {
            TimerPhase::Running | TimerPhase::Paused => {
                self.reset();
                true
            }
            TimerPhase::Idle => false,
        }
    }

    fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.elapsed_secs = 0;
        self.started_at = None;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}
