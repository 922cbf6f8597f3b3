//! Integration tests for the timer service actor.
//!
//! All tests run on a paused tokio clock so tick scheduling is
//! deterministic: `advance` moves time, the actor processes whatever came
//! due, and `status()` round-trips through the actor as a sync point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use studytrack_core::error::{DatabaseError, NotifyError};
use studytrack_core::{
    Command, CompletedSession, Event, NoopNotifier, Notifier, SessionRecorder, SystemClock,
    TimerPhase, TimerService, TimerServiceConfig,
};

#[derive(Default)]
struct MockRecorder {
    sessions: Mutex<Vec<CompletedSession>>,
    fail: bool,
}

impl MockRecorder {
    fn failing() -> Self {
        Self {
            sessions: Mutex::default(),
            fail: true,
        }
    }

    fn recorded(&self) -> Vec<CompletedSession> {
        self.sessions.lock().unwrap().clone()
    }
}

impl SessionRecorder for MockRecorder {
    fn record_session(&self, completed: &CompletedSession) -> Result<i64, DatabaseError> {
        if self.fail {
            return Err(DatabaseError::QueryFailed("disk full".into()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push(completed.clone());
        Ok(sessions.len() as i64)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    bodies: Mutex<Vec<String>>,
    cleared: AtomicUsize,
}

impl Notifier for RecordingNotifier {
    fn update(&self, _title: &str, body: &str) -> Result<(), NotifyError> {
        self.bodies.lock().unwrap().push(body.to_string());
        Ok(())
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recorder with persistence latency, to surface shutdown ordering bugs.
struct SlowRecorder {
    inner: MockRecorder,
    delay: Duration,
}

impl SessionRecorder for SlowRecorder {
    fn record_session(&self, completed: &CompletedSession) -> Result<i64, DatabaseError> {
        std::thread::sleep(self.delay);
        self.inner.record_session(completed)
    }
}

struct DenyingNotifier {
    attempts: AtomicUsize,
}

impl Notifier for DenyingNotifier {
    fn update(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Denied("notifications disabled".into()))
    }

    fn clear(&self) {}
}

fn spawn_with(recorder: Arc<MockRecorder>, notifier: Arc<dyn Notifier>) -> TimerService {
    TimerService::spawn(
        TimerServiceConfig::default(),
        recorder,
        notifier,
        Arc::new(SystemClock),
    )
}

fn spawn(recorder: Arc<MockRecorder>) -> TimerService {
    spawn_with(recorder, Arc::new(NoopNotifier))
}

/// Advance the paused clock and give the actor a chance to drain what came
/// due. Steps in sub-period chunks so every 1-second tick fires separately
/// instead of being coalesced by the interval's missed-tick handling.
async fn advance(duration: Duration) {
    let step = Duration::from_millis(500);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        let chunk = remaining.min(step);
        tokio::time::advance(chunk).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        remaining -= chunk;
    }
}

/// Wait for the detached record task to report back.
async fn await_record_result(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Event {
    loop {
        match events.recv().await.unwrap() {
            event @ (Event::SessionRecorded { .. } | Event::RecordFailed { .. }) => return event,
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn pause_resume_records_only_running_ticks() {
    let recorder = Arc::new(MockRecorder::default());
    let service = spawn(recorder.clone());
    let handle = service.bind();
    let mut events = handle.events();

    // Start, 5 ticks, pause, 3 paused seconds, resume, 2 ticks, stop.
    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(5)).await;
    handle.command(Command::Pause).await.unwrap();
    advance(Duration::from_secs(3)).await;
    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;

    let outcome = handle.command(Command::Stop).await.unwrap();
    assert!(outcome.applied);

    let recorded = match await_record_result(&mut events).await {
        Event::SessionRecorded { duration_secs, .. } => duration_secs,
        other => panic!("expected SessionRecorded, got {other:?}"),
    };
    assert_eq!(recorded, 7);

    let sessions = recorder.recorded();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_secs, 7);
}

#[tokio::test(start_paused = true)]
async fn ticks_are_suspended_while_paused() {
    let service = spawn(Arc::new(MockRecorder::default()));
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    handle.command(Command::Pause).await.unwrap();

    // A long paused stretch must not advance the counter at all.
    advance(Duration::from_secs(600)).await;
    let snap = handle.status().await.unwrap();
    assert_eq!(snap.phase, TimerPhase::Paused);
    assert_eq!(snap.elapsed_secs, 2);

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(1)).await;
    assert_eq!(handle.status().await.unwrap().elapsed_secs, 3);
}

#[tokio::test(start_paused = true)]
async fn pause_mid_cycle_freezes_pre_tick_value() {
    let service = spawn(Arc::new(MockRecorder::default()));
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    // Halfway into the next tick cycle: the partial second is dropped.
    advance(Duration::from_millis(500)).await;

    let outcome = handle.command(Command::Pause).await.unwrap();
    assert_eq!(outcome.snapshot.phase, TimerPhase::Paused);
    assert_eq!(outcome.snapshot.elapsed_secs, 2);

    advance(Duration::from_secs(10)).await;
    assert_eq!(handle.status().await.unwrap().elapsed_secs, 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_without_recording() {
    let recorder = Arc::new(MockRecorder::default());
    let service = spawn(recorder.clone());
    let handle = service.bind();
    let mut events = handle.events();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(3)).await;
    let outcome = handle.command(Command::Cancel).await.unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.snapshot.phase, TimerPhase::Idle);
    assert_eq!(outcome.snapshot.elapsed_secs, 0);

    loop {
        match events.recv().await.unwrap() {
            Event::SessionCancelled { discarded_secs, .. } => {
                assert_eq!(discarded_secs, 3);
                break;
            }
            Event::SessionRecorded { .. } => panic!("cancel must never record"),
            _ => {}
        }
    }
    assert!(recorder.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_length_and_double_stop_never_record() {
    let recorder = Arc::new(MockRecorder::default());
    let service = spawn(recorder.clone());
    let handle = service.bind();
    let mut events = handle.events();

    // Stop before the first tick: nothing accrued, nothing recorded.
    handle.command(Command::Start).await.unwrap();
    let outcome = handle.command(Command::Stop).await.unwrap();
    assert!(outcome.applied);
    assert!(outcome.completed.is_none());

    // Stop while already idle is a successful no-op.
    let second = handle.command(Command::Stop).await.unwrap();
    assert!(!second.applied);

    // A real session records exactly once even if stop is double-tapped.
    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    handle.command(Command::Stop).await.unwrap();
    handle.command(Command::Stop).await.unwrap();

    await_record_result(&mut events).await;
    assert_eq!(recorder.recorded().len(), 1);
    assert_eq!(recorder.recorded()[0].duration_secs, 2);
}

#[tokio::test(start_paused = true)]
async fn unbinding_all_clients_leaves_timer_running() {
    let recorder = Arc::new(MockRecorder::default());
    let service = spawn(recorder.clone());

    let handle = service.bind();
    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    drop(handle);

    // No bound clients at all; the timer keeps accumulating.
    advance(Duration::from_secs(3)).await;

    let rebound = service.bind();
    let snap = rebound.status().await.unwrap();
    assert_eq!(snap.phase, TimerPhase::Running);
    assert_eq!(snap.elapsed_secs, 5);
}

#[tokio::test(start_paused = true)]
async fn recorder_failure_leaves_timer_usable() {
    let recorder = Arc::new(MockRecorder::failing());
    let service = spawn(recorder.clone());
    let handle = service.bind();
    let mut events = handle.events();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    handle.command(Command::Stop).await.unwrap();

    match await_record_result(&mut events).await {
        Event::RecordFailed { message, .. } => assert!(message.contains("disk full")),
        other => panic!("expected RecordFailed, got {other:?}"),
    }

    // The failed record did not corrupt the state machine.
    let snap = handle.status().await.unwrap();
    assert_eq!(snap.phase, TimerPhase::Idle);
    assert_eq!(snap.elapsed_secs, 0);

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(1)).await;
    assert_eq!(handle.status().await.unwrap().elapsed_secs, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_in_flight_session() {
    let recorder = Arc::new(MockRecorder::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = spawn_with(recorder.clone(), notifier.clone());
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(4)).await;

    let completed = service.shutdown().await.unwrap();
    assert_eq!(completed.unwrap().duration_secs, 4);

    // Shutdown records synchronously and releases the notification.
    assert_eq!(recorder.recorded().len(), 1);
    assert_eq!(recorder.recorded()[0].duration_secs, 4);
    assert_eq!(notifier.cleared.load(Ordering::SeqCst), 1);

    // The actor is gone; commands now fail.
    assert!(handle.command(Command::Start).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_detached_record_of_a_stopped_session() {
    let recorder = Arc::new(SlowRecorder {
        inner: MockRecorder::default(),
        delay: Duration::from_millis(100),
    });
    let service = TimerService::spawn(
        TimerServiceConfig::default(),
        recorder.clone(),
        Arc::new(NoopNotifier),
        Arc::new(SystemClock),
    );
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    handle.command(Command::Stop).await.unwrap();

    // Shutdown right behind the stop: the record hand-off is still in
    // flight on its own task and must land before teardown returns.
    let completed = service.shutdown().await.unwrap();
    assert!(completed.is_none());
    assert_eq!(recorder.inner.recorded().len(), 1);
    assert_eq!(recorder.inner.recorded()[0].duration_secs, 2);
}

#[tokio::test(start_paused = true)]
async fn notification_tracks_every_tick_and_transition() {
    let recorder = Arc::new(MockRecorder::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = spawn_with(recorder, notifier.clone());
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(3)).await;
    handle.command(Command::Pause).await.unwrap();

    let bodies = notifier.bodies.lock().unwrap().clone();
    // Initial publish before any command, then one per tick, then the
    // pause transition republish.
    assert_eq!(bodies[0], "00:00:00");
    assert!(bodies.contains(&"00:00:01".to_string()));
    assert!(bodies.contains(&"00:00:02".to_string()));
    assert!(bodies.contains(&"00:00:03".to_string()));
    assert_eq!(bodies.last().unwrap(), "00:00:03");
}

#[tokio::test(start_paused = true)]
async fn notification_denial_reported_once_timer_unaffected() {
    let recorder = Arc::new(MockRecorder::default());
    let notifier = Arc::new(DenyingNotifier {
        attempts: AtomicUsize::new(0),
    });
    let service = spawn_with(recorder, notifier.clone());
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(3)).await;

    // Denied at the initial publish; never retried per tick.
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);

    // The timer itself never loses elapsed time over a missing notification.
    assert_eq!(handle.status().await.unwrap().elapsed_secs, 3);
}

/// Unavailable on the initial publish, fine afterwards.
struct FlakyNotifier {
    inner: RecordingNotifier,
    attempts: AtomicUsize,
}

impl Notifier for FlakyNotifier {
    fn update(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(NotifyError::Unavailable("surface not ready".into()));
        }
        self.inner.update(title, body)
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

#[tokio::test(start_paused = true)]
async fn transient_initial_failure_keeps_publishing_enabled() {
    let notifier = Arc::new(FlakyNotifier {
        inner: RecordingNotifier::default(),
        attempts: AtomicUsize::new(0),
    });
    let service = spawn_with(Arc::new(MockRecorder::default()), notifier.clone());
    let handle = service.bind();

    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;

    // Only a denial disables publishing; ticks after the transient
    // failure still reach the notifier.
    let bodies = notifier.inner.bodies.lock().unwrap().clone();
    assert!(bodies.contains(&"00:00:01".to_string()));
    assert!(bodies.contains(&"00:00:02".to_string()));
}

#[tokio::test(start_paused = true)]
async fn snapshots_are_monotonic_within_a_span() {
    let service = spawn(Arc::new(MockRecorder::default()));
    let handle = service.bind();
    let mut snapshots = handle.subscribe();

    handle.command(Command::Start).await.unwrap();
    let mut last = 0u64;
    for _ in 0..10 {
        advance(Duration::from_secs(1)).await;
        let snap = *snapshots.borrow_and_update();
        assert!(snap.elapsed_secs >= last);
        last = snap.elapsed_secs;
    }
    assert_eq!(last, 10);
}

#[tokio::test(start_paused = true)]
async fn subject_set_on_handle_is_attributed_at_stop() {
    let recorder = Arc::new(MockRecorder::default());
    let service = spawn(recorder.clone());
    let handle = service.bind();
    let mut events = handle.events();

    handle.set_subject(Some(11)).await.unwrap();
    handle.command(Command::Start).await.unwrap();
    advance(Duration::from_secs(2)).await;
    handle.command(Command::Stop).await.unwrap();

    await_record_result(&mut events).await;
    assert_eq!(recorder.recorded()[0].subject_id, Some(11));
}
