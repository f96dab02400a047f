use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::{NotificationSink, ReminderNotification};

const EVENT_CAPACITY: usize = 16;

/// Payload of the in-app reminder event consumed by the banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppEvent {
    #[serde(skip)]
    pub name: &'static str,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

/// Publishes every firing as an [`InAppEvent`] to any number of banners.
pub struct InAppEventSink {
    sender: broadcast::Sender<InAppEvent>,
}

impl InAppEventSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InAppEvent> {
        self.sender.subscribe()
    }
}

impl Default for InAppEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for InAppEventSink {
    fn name(&self) -> &'static str {
        "in-app"
    }

    async fn notify(&self, notification: &ReminderNotification) -> anyhow::Result<()> {
        let event = InAppEvent {
            name: notification.kind.event_name(),
            message: notification.message.clone(),
            fired_at: notification.fired_at,
        };

        if self.sender.send(event).is_err() {
            log::debug!(
                "No banner is listening [event = {}]",
                notification.kind.event_name()
            );
        }
        Ok(())
    }
}
