//! Timer service host: a tokio actor owning the timer engine.
//!
//! All commands and ticks are serialized through one `select!` loop, so
//! tick-vs-command races resolve deterministically: the loop is `biased`
//! with the command branch first, which means a pause/stop/cancel queued
//! before a pending tick wins and that tick is dropped for the cycle.
//!
//! The tick scheduler is an interval that only exists while the engine is
//! running; while paused or idle the branch is disabled entirely, so the
//! service consumes no timer wake-ups and elapsed time cannot advance.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::notify::{NotificationContent, Notifier};
use super::SessionRecorder;
use crate::error::{NotifyError, ServiceError};
use crate::events::Event;
use crate::timer::{Clock, Command, CommandOutcome, CompletedSession, TimerEngine, TimerPhase, TimerSnapshot};

/// Construction-time configuration for the timer service.
#[derive(Clone)]
pub struct TimerServiceConfig {
    /// Period of the tick scheduler while running.
    pub tick_interval: Duration,
    pub notification: NotificationContent,
    /// Subject preselected for the first session.
    pub subject_id: Option<i64>,
}

impl Default for TimerServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            notification: NotificationContent::default(),
            subject_id: None,
        }
    }
}

enum Request {
    Command {
        cmd: Command,
        reply: oneshot::Sender<CommandOutcome>,
    },
    SetSubject {
        subject_id: Option<i64>,
    },
    Query {
        reply: oneshot::Sender<TimerSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<Option<CompletedSession>>,
    },
}

/// Owning handle to the running timer service.
///
/// Holds its own command sender, so the actor stays alive while every bound
/// [`TimerHandle`] is dropped. Explicit [`TimerService::shutdown`] (or a
/// stop command) is the only way to end the timer.
pub struct TimerService {
    tx: mpsc::Sender<Request>,
    snapshot_rx: watch::Receiver<TimerSnapshot>,
    events_tx: broadcast::Sender<Event>,
    join: Option<JoinHandle<()>>,
}

impl TimerService {
    /// Start the service actor on the current tokio runtime.
    ///
    /// The initial notification is published before the actor accepts its
    /// first command; platforms that require an ongoing notification for
    /// background survival get it in the right order.
    pub fn spawn(
        config: TimerServiceConfig,
        recorder: Arc<dyn SessionRecorder>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(TimerSnapshot::idle());
        let (events_tx, _) = broadcast::channel(64);

        let mut engine = TimerEngine::new();
        engine.set_subject(config.subject_id);

        let mut notify_enabled = config.notification.enabled;
        if notify_enabled {
            let initial = config.notification.body(&TimerSnapshot::idle());
            match notifier.update(&config.notification.title, &initial) {
                Ok(()) => {}
                Err(NotifyError::Denied(message)) => {
                    warn!(%message, "notification privilege denied");
                    let _ = events_tx.send(Event::NotificationDenied {
                        message,
                        at: clock.now(),
                    });
                    notify_enabled = false;
                }
                // Transient failures keep publishing enabled, same as the
                // per-tick path.
                Err(e) => {
                    debug!(error = %e, "initial notification update failed");
                }
            }
        }

        let actor = Actor {
            engine,
            snapshot_tx,
            events_tx: events_tx.clone(),
            recorder,
            notifier,
            content: config.notification,
            clock,
            notify_enabled,
            records: JoinSet::new(),
        };
        let join = tokio::spawn(actor.run(rx, config.tick_interval));
        info!("timer service started");

        Self {
            tx,
            snapshot_rx,
            events_tx,
            join: Some(join),
        }
    }

    /// Bind a client. Binding never affects the timer phase, and dropping
    /// the returned handle never stops the timer.
    pub fn bind(&self) -> TimerHandle {
        TimerHandle {
            tx: self.tx.clone(),
            snapshot_rx: self.snapshot_rx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> TimerSnapshot {
        *self.snapshot_rx.borrow()
    }

    /// Stop the service: drives a final stop through the engine (finalizing
    /// and recording any in-flight session synchronously), waits for every
    /// pending record hand-off to land, clears the notification, and joins
    /// the actor.
    pub async fn shutdown(mut self) -> Result<Option<CompletedSession>, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| ServiceError::Stopped)?;
        let completed = reply_rx.await.map_err(|_| ServiceError::ReplyDropped)?;
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        Ok(completed)
    }
}

/// Non-owning client handle: issues commands, reads snapshots, subscribes
/// to events. Cheap to clone; dropping it is "unbind".
#[derive(Clone)]
pub struct TimerHandle {
    tx: mpsc::Sender<Request>,
    snapshot_rx: watch::Receiver<TimerSnapshot>,
    events_tx: broadcast::Sender<Event>,
}

impl TimerHandle {
    /// Issue a command and wait for the outcome snapshot. An invalid command
    /// for the current phase comes back with `applied == false`, never an
    /// error.
    pub async fn command(&self, cmd: Command) -> Result<CommandOutcome, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Command {
                cmd,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ServiceError::Stopped)?;
        reply_rx.await.map_err(|_| ServiceError::ReplyDropped)
    }

    /// Set the subject the next completed session is attributed to.
    pub async fn set_subject(&self, subject_id: Option<i64>) -> Result<(), ServiceError> {
        self.tx
            .send(Request::SetSubject { subject_id })
            .await
            .map_err(|_| ServiceError::Stopped)
    }

    /// Read the live snapshot through the actor (a synchronization point:
    /// everything queued before this call has been processed).
    pub async fn status(&self) -> Result<TimerSnapshot, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Query { reply: reply_tx })
            .await
            .map_err(|_| ServiceError::Stopped)?;
        reply_rx.await.map_err(|_| ServiceError::ReplyDropped)
    }

    /// Last published snapshot, without touching the actor.
    pub fn snapshot(&self) -> TimerSnapshot {
        *self.snapshot_rx.borrow()
    }

    /// Subscribe to the snapshot stream. Values are totally ordered; a
    /// subscriber never observes elapsed time moving backwards within a
    /// running/paused span.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to service events (transitions, record results).
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }
}

struct Actor {
    engine: TimerEngine,
    snapshot_tx: watch::Sender<TimerSnapshot>,
    events_tx: broadcast::Sender<Event>,
    recorder: Arc<dyn SessionRecorder>,
    notifier: Arc<dyn Notifier>,
    content: NotificationContent,
    clock: Arc<dyn Clock>,
    notify_enabled: bool,
    /// In-flight detached record tasks; drained before teardown completes.
    records: JoinSet<()>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>, tick_interval: Duration) {
        let mut ticker: Option<time::Interval> = None;
        loop {
            tokio::select! {
                biased;

                req = rx.recv() => match req {
                    Some(Request::Command { cmd, reply }) => {
                        let outcome = self.handle_command(cmd);
                        self.arm_ticker(&mut ticker, tick_interval);
                        let _ = reply.send(outcome);
                    }
                    Some(Request::SetSubject { subject_id }) => {
                        self.engine.set_subject(subject_id);
                    }
                    Some(Request::Query { reply }) => {
                        let _ = reply.send(self.engine.snapshot());
                    }
                    Some(Request::Shutdown { reply }) => {
                        let completed = self.finalize().await;
                        let _ = reply.send(completed);
                        return;
                    }
                    // Every sender dropped without an explicit shutdown:
                    // flush a pending stop all the same.
                    None => {
                        self.finalize().await;
                        return;
                    }
                },

                _ = next_tick(&mut ticker), if ticker.is_some() => {
                    self.handle_tick();
                }

                // Reap finished record tasks so the set stays small.
                Some(_) = self.records.join_next(), if !self.records.is_empty() => {}
            }
        }
    }

    /// Keep the tick scheduler armed exactly while running. The interval is
    /// re-created on every entry to running, so paused time never produces
    /// a tick backlog.
    fn arm_ticker(&self, ticker: &mut Option<time::Interval>, period: Duration) {
        match self.engine.phase() {
            TimerPhase::Running => {
                if ticker.is_none() {
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    *ticker = Some(interval);
                }
            }
            _ => *ticker = None,
        }
    }

    fn handle_command(&mut self, cmd: Command) -> CommandOutcome {
        let now = self.clock.now();
        let was_phase = self.engine.phase();
        let was_elapsed = self.engine.elapsed_secs();
        let outcome = self.engine.apply(cmd, now);

        if !outcome.applied {
            debug!(?cmd, phase = ?was_phase, "command was a no-op");
            return outcome;
        }
        info!(?cmd, phase = ?self.engine.phase(), elapsed_secs = outcome.snapshot.elapsed_secs, "command applied");

        let event = match cmd {
            Command::Start if was_phase == TimerPhase::Paused => Event::SessionResumed {
                elapsed_secs: outcome.snapshot.elapsed_secs,
                at: now,
            },
            Command::Start => Event::SessionStarted {
                subject_id: self.engine.subject_id(),
                at: now,
            },
            Command::Pause => Event::SessionPaused {
                elapsed_secs: outcome.snapshot.elapsed_secs,
                at: now,
            },
            Command::Stop => Event::SessionStopped {
                completed: outcome.completed.clone(),
                at: now,
            },
            Command::Cancel => Event::SessionCancelled {
                discarded_secs: was_elapsed,
                at: now,
            },
        };
        self.emit(event);
        self.publish(outcome.snapshot);

        if let Some(completed) = &outcome.completed {
            self.record_detached(completed.clone());
        }
        outcome
    }

    fn handle_tick(&mut self) {
        if self.engine.tick() {
            debug!(elapsed_secs = self.engine.elapsed_secs(), "tick");
            self.publish(self.engine.snapshot());
        }
    }

    /// Record off the actor so ticking never blocks on persistence. The
    /// outcome comes back as an event; a failure never rolls back the stop.
    /// Tasks are tracked so teardown can wait for every pending record.
    fn record_detached(&mut self, completed: CompletedSession) {
        let recorder = Arc::clone(&self.recorder);
        let events = self.events_tx.clone();
        let clock = Arc::clone(&self.clock);
        self.records.spawn(async move {
            let duration_secs = completed.duration_secs;
            let result =
                tokio::task::spawn_blocking(move || recorder.record_session(&completed)).await;
            let event = match result {
                Ok(Ok(session_id)) => {
                    info!(session_id, duration_secs, "session recorded");
                    Event::SessionRecorded {
                        session_id,
                        duration_secs,
                        at: clock.now(),
                    }
                }
                Ok(Err(e)) => {
                    error!(error = %e, "failed to record session");
                    Event::RecordFailed {
                        message: e.to_string(),
                        at: clock.now(),
                    }
                }
                Err(e) => {
                    error!(error = %e, "session recording task panicked");
                    Event::RecordFailed {
                        message: e.to_string(),
                        at: clock.now(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }

    /// Teardown path: stop, record synchronously, wait out any detached
    /// record still in flight, release the notification.
    async fn finalize(&mut self) -> Option<CompletedSession> {
        while self.records.join_next().await.is_some() {}
        let now = self.clock.now();
        let outcome = self.engine.apply(Command::Stop, now);
        if outcome.applied {
            self.emit(Event::SessionStopped {
                completed: outcome.completed.clone(),
                at: now,
            });
        }
        if let Some(completed) = &outcome.completed {
            match self.recorder.record_session(completed) {
                Ok(session_id) => {
                    info!(session_id, duration_secs = completed.duration_secs, "session recorded at shutdown");
                    self.emit(Event::SessionRecorded {
                        session_id,
                        duration_secs: completed.duration_secs,
                        at: self.clock.now(),
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to record session at shutdown");
                    self.emit(Event::RecordFailed {
                        message: e.to_string(),
                        at: self.clock.now(),
                    });
                }
            }
        }
        self.publish(outcome.snapshot);
        self.notifier.clear();
        info!("timer service shut down");
        outcome.completed
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    fn publish(&mut self, snapshot: TimerSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
        if !self.notify_enabled || !self.content.enabled {
            return;
        }
        match self
            .notifier
            .update(&self.content.title, &self.content.body(&snapshot))
        {
            Ok(()) => {}
            Err(NotifyError::Denied(message)) => {
                // Reported once, then publishing is disabled; the timer
                // keeps running either way.
                warn!(%message, "notification privilege denied");
                self.emit(Event::NotificationDenied {
                    message,
                    at: self.clock.now(),
                });
                self.notify_enabled = false;
            }
            Err(e) => {
                debug!(error = %e, "notification update failed");
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
