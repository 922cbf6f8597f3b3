//! # Studytrack Core Library
//!
//! Core business logic for Studytrack, a study-tracking application: users
//! define subjects and tasks, and a long-running timer service tracks timed
//! study sessions that are persisted when they complete. The CLI binary and
//! any GUI shell are thin layers over this library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a deterministic state machine over tick events; the
//!   caller supplies the current instant, the engine never reads a clock
//! - **Timer Service**: a tokio actor that owns the engine, schedules 1-second
//!   ticks while running, publishes snapshots, and records completed sessions
//! - **Storage**: SQLite-based subject/task/session persistence and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: core timer state machine
//! - [`TimerService`]: owning service host; UI clients bind [`TimerHandle`]s
//! - [`Database`]: subject, task and session persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod model;
pub mod service;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, NotifyError, ServiceError};
pub use events::Event;
pub use model::{Priority, Session, Subject, Task};
pub use service::{
    NoopNotifier, NotificationContent, Notifier, SessionRecorder, TimerHandle, TimerService,
    TimerServiceConfig,
};
pub use storage::{Config, Database};
pub use timer::{
    Clock, Command, CommandOutcome, CompletedSession, SystemClock, TimerEngine, TimerPhase,
    TimerSnapshot,
};
