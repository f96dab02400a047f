use async_trait::async_trait;
use notify_rust::Notification;
use serde::Deserialize;

use super::{NotificationSink, ReminderNotification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// Desktop notification with title and body only.
///
/// Raised only when the firing asked for it and permission was granted.
pub struct OsNotificationSink {
    app_name: String,
    permission: NotificationPermission,
}

impl OsNotificationSink {
    pub fn new(app_name: impl Into<String>, permission: NotificationPermission) -> Self {
        Self {
            app_name: app_name.into(),
            permission,
        }
    }

    fn should_show(&self, notification: &ReminderNotification) -> bool {
        notification.os_notification_requested && self.permission == NotificationPermission::Granted
    }
}

#[async_trait]
impl NotificationSink for OsNotificationSink {
    fn name(&self) -> &'static str {
        "os-notification"
    }

    async fn notify(&self, notification: &ReminderNotification) -> anyhow::Result<()> {
        if !self.should_show(notification) {
            log::debug!(
                "OS notification not shown [requested = {}, permission = {:?}]",
                notification.os_notification_requested,
                self.permission
            );
            return Ok(());
        }

        let app_name = self.app_name.clone();
        let title = notification.title.clone();
        let body = notification.message.clone();

        tokio::task::spawn_blocking(move || {
            Notification::new()
                .summary(&title)
                .body(&body)
                .appname(&app_name)
                .show()
                .map(|_| ())
                .map_err(|error| anyhow::anyhow!("could not show notification: {error}"))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::reminder::ReminderKind;

    fn notification(requested: bool) -> ReminderNotification {
        ReminderNotification::new(ReminderKind::Hydration, "Drink", Utc::now(), requested)
    }

    #[test]
    fn needs_both_opt_in_and_permission() {
        let granted = OsNotificationSink::new("wellnudge", NotificationPermission::Granted);
        let denied = OsNotificationSink::new("wellnudge", NotificationPermission::Denied);
        let undecided = OsNotificationSink::new("wellnudge", NotificationPermission::Default);

        assert!(granted.should_show(&notification(true)));
        assert!(!granted.should_show(&notification(false)));
        assert!(!denied.should_show(&notification(true)));
        assert!(!undecided.should_show(&notification(true)));
    }

    #[tokio::test]
    async fn skipped_notification_succeeds() {
        let denied = OsNotificationSink::new("wellnudge", NotificationPermission::Denied);

        assert!(denied.notify(&notification(true)).await.is_ok());
    }
}
