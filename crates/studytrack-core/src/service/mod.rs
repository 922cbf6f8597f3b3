//! Timer service: the owning host for the session timer state machine.
//!
//! The service is a single tokio actor that owns the [`TimerEngine`] for the
//! lifetime of the process. UI clients never touch the engine; they bind a
//! [`TimerHandle`] that issues commands over a message channel and observes
//! snapshots over a watch channel. Dropping every handle leaves the timer
//! running; only an explicit stop command or [`TimerService::shutdown`]
//! tears it down.

mod host;
mod notify;

pub use host::{TimerHandle, TimerService, TimerServiceConfig};
pub use notify::{NoopNotifier, NotificationContent, Notifier};

use crate::error::DatabaseError;
use crate::timer::CompletedSession;

/// Persistence boundary for finalized sessions.
///
/// Called at most once per logical session, fire-and-forget from the state
/// machine's perspective: a failure is surfaced as an event but never rolls
/// back or re-runs the timer transition.
pub trait SessionRecorder: Send + Sync {
    fn record_session(&self, completed: &CompletedSession) -> Result<i64, DatabaseError>;
}
