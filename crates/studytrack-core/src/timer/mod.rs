mod clock;
mod engine;
mod snapshot;

pub use clock::{Clock, SystemClock};
pub use engine::{Command, CommandOutcome, CompletedSession, TimerEngine};
pub use snapshot::{TimerPhase, TimerSnapshot};
