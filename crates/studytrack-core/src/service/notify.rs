//! Notification publishing for the timer service.
//!
//! The service renders every snapshot into a single ongoing notification,
//! updated in place. What "notification" means is up to the embedding
//! platform; the core only talks to the [`Notifier`] trait.

use crate::error::NotifyError;
use crate::storage::NotificationsConfig;
use crate::timer::TimerSnapshot;

/// Target surface for the ongoing session notification.
///
/// `update` is called on every tick while the timer runs, so implementations
/// must not block. A `Denied` error means the platform refused the required
/// privilege; the service reports that once and stops publishing.
pub trait Notifier: Send + Sync {
    fn update(&self, title: &str, body: &str) -> Result<(), NotifyError>;

    /// Remove the ongoing notification. Called at service teardown.
    fn clear(&self);
}

/// Notifier that publishes nothing. Used when notifications are disabled
/// and in headless tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn update(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn clear(&self) {}
}

/// Static content of the ongoing notification, built once at service start.
#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub title: String,
    pub enabled: bool,
}

impl NotificationContent {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            title: config.title.clone(),
            enabled: config.enabled,
        }
    }

    /// Body line for a snapshot: the elapsed time as HH:MM:SS.
    pub fn body(&self, snapshot: &TimerSnapshot) -> String {
        snapshot.hms()
    }
}

impl Default for NotificationContent {
    fn default() -> Self {
        Self::from_config(&NotificationsConfig::default())
    }
}
