use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::{NotificationSink, ReminderNotification};

/// Plays a short sound resource with an external player.
///
/// A new firing restarts the sound from the beginning. Nothing happens when no
/// resource is configured or the file is missing.
pub struct SoundSink {
    player: String,
    resource: Option<PathBuf>,
    current: Mutex<Option<Child>>,
}

impl SoundSink {
    pub fn new(player: impl Into<String>, resource: Option<PathBuf>) -> Self {
        Self {
            player: player.into(),
            resource,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl NotificationSink for SoundSink {
    fn name(&self) -> &'static str {
        "sound"
    }

    async fn notify(&self, _notification: &ReminderNotification) -> anyhow::Result<()> {
        let Some(resource) = self.resource.as_ref().filter(|path| path.exists()) else {
            log::debug!("No sound resource present, skipping");
            return Ok(());
        };

        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("sound player state is poisoned"))?;
        if let Some(mut previous) = current.take() {
            let _ = previous.start_kill();
        }

        let child = Command::new(&self.player)
            .arg(resource)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        *current = Some(child);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::reminder::ReminderKind;

    fn notification() -> ReminderNotification {
        ReminderNotification::new(ReminderKind::Hydration, "Drink", Utc::now(), false)
    }

    #[tokio::test]
    async fn missing_resource_is_a_no_op() {
        let unset = SoundSink::new("paplay", None);
        let missing = SoundSink::new("paplay", Some(PathBuf::from("/nonexistent/ping.oga")));

        assert!(unset.notify(&notification()).await.is_ok());
        assert!(missing.notify(&notification()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_player_is_reported() {
        let resource = tempfile::NamedTempFile::new().unwrap();
        let sink = SoundSink::new(
            "wellnudge-player-that-does-not-exist",
            Some(resource.path().to_path_buf()),
        );

        assert!(sink.notify(&notification()).await.is_err());
    }
}
