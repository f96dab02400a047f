use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{NotificationSink, ReminderNotification};

pub const VIBRATION_PULSE: Duration = Duration::from_millis(80);

/// A device that can produce a short physical or audible pulse.
pub trait Haptics: Send + Sync + 'static {
    fn pulse(&self, duration: Duration) -> anyhow::Result<()>;
}

/// Terminal bell, the closest thing a console has to a vibration motor.
pub struct TerminalBell;

impl Haptics for TerminalBell {
    fn pulse(&self, _duration: Duration) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        Ok(())
    }
}

pub struct VibrationSink {
    device: Option<Arc<dyn Haptics>>,
}

impl VibrationSink {
    pub fn new(device: Option<Arc<dyn Haptics>>) -> Self {
        Self { device }
    }
}

#[async_trait]
impl NotificationSink for VibrationSink {
    fn name(&self) -> &'static str {
        "vibration"
    }

    async fn notify(&self, _notification: &ReminderNotification) -> anyhow::Result<()> {
        match &self.device {
            Some(device) => device.pulse(VIBRATION_PULSE),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::models::reminder::ReminderKind;

    #[derive(Default)]
    struct RecordingMotor(Mutex<Vec<Duration>>);

    impl Haptics for RecordingMotor {
        fn pulse(&self, duration: Duration) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(duration);
            Ok(())
        }
    }

    fn notification() -> ReminderNotification {
        ReminderNotification::new(ReminderKind::Hydration, "Drink", Utc::now(), false)
    }

    #[tokio::test]
    async fn pulses_once_for_eighty_milliseconds() {
        let motor = Arc::new(RecordingMotor::default());
        let sink = VibrationSink::new(Some(motor.clone()));

        sink.notify(&notification()).await.unwrap();

        assert_eq!(*motor.0.lock().unwrap(), vec![Duration::from_millis(80)]);
    }

    #[tokio::test]
    async fn missing_device_is_skipped() {
        assert!(VibrationSink::new(None).notify(&notification()).await.is_ok());
    }
}
