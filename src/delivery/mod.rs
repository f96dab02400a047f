use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::reminder::ReminderKind;

mod haptics;
mod in_app;
mod os_notification;
mod sound;

pub use haptics::{Haptics, TerminalBell, VIBRATION_PULSE, VibrationSink};
pub use in_app::{InAppEvent, InAppEventSink};
pub use os_notification::{NotificationPermission, OsNotificationSink};
pub use sound::SoundSink;

/// One reminder firing, as handed to every sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    pub kind: ReminderKind,
    pub title: String,
    pub message: String,
    pub fired_at: DateTime<Utc>,
    pub os_notification_requested: bool,
}

impl ReminderNotification {
    pub fn new(
        kind: ReminderKind,
        message: impl Into<String>,
        fired_at: DateTime<Utc>,
        os_notification_requested: bool,
    ) -> Self {
        Self {
            kind,
            title: kind.notification_title().to_owned(),
            message: message.into(),
            fired_at,
            os_notification_requested,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &ReminderNotification) -> anyhow::Result<()>;
}

/// Ordered fan-out over independent sinks. A failing sink is logged and the
/// remaining sinks still run.
#[derive(Default, Clone)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub async fn fire(&self, notification: &ReminderNotification) {
        log::info!(
            "Firing reminder [kind = {}, message = {:?}, fired_at = {}]",
            notification.kind,
            notification.message,
            notification.fired_at
        );

        for sink in &self.sinks {
            if let Err(error) = sink.notify(notification).await {
                log::warn!(
                    "Notification sink failed [sink = {}, kind = {}, error = {:#}]",
                    sink.name(),
                    notification.kind,
                    error
                );
            }
        }
    }
}
