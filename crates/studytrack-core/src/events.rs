use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::CompletedSession;

/// Every state change in the timer service produces an Event.
/// Bound clients subscribe to these; the snapshot stream carries the
/// continuously updating elapsed time separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        subject_id: Option<i64>,
        at: DateTime<Utc>,
    },
    SessionPaused {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Stop finalized. `completed` is `None` when nothing accrued
    /// (zero-length sessions are never persisted).
    SessionStopped {
        completed: Option<CompletedSession>,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        discarded_secs: u64,
        at: DateTime<Utc>,
    },
    /// The recorder accepted a completed session.
    SessionRecorded {
        session_id: i64,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// The recorder rejected a completed session. The timer state is
    /// unaffected; the session is logically complete regardless.
    RecordFailed {
        message: String,
        at: DateTime<Utc>,
    },
    /// The notification surface refused the required privilege. Reported
    /// once per service lifetime, not per tick.
    NotificationDenied {
        message: String,
        at: DateTime<Utc>,
    },
}
