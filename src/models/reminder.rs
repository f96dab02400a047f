use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_INTERVAL_MINUTES: u32 = 15;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;
pub const INTERVAL_STEP_MINUTES: u32 = 15;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 120;

pub const MAX_HOUR: u32 = 23;
pub const DEFAULT_BUSINESS_HOUR_START: u32 = 9;
pub const DEFAULT_BUSINESS_HOUR_END: u32 = 17;

pub const DEFAULT_HYDRATION_MESSAGE: &str = "Time for a glass of water, stay hydrated!";
pub const VITAMIN_D_MESSAGE: &str = "Time to step outside for some natural Vitamin D! ☀️";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Hydration,
    VitaminD,
}

impl ReminderKind {
    pub fn storage_key(&self) -> &'static str {
        match self {
            ReminderKind::Hydration => "hydration.settings.v1",
            ReminderKind::VitaminD => "vitamin-d.settings.v1",
        }
    }

    pub fn sync_topic(&self) -> &'static str {
        match self {
            ReminderKind::Hydration => "hydration",
            ReminderKind::VitaminD => "vitamin-d",
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ReminderKind::Hydration => "hydration:notify",
            ReminderKind::VitaminD => "vitamin-d:notify",
        }
    }

    pub fn notification_title(&self) -> &'static str {
        match self {
            ReminderKind::Hydration => "Hydration Reminder",
            ReminderKind::VitaminD => "Vitamin D Time!",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sync_topic())
    }
}

/// Persisted configuration of the recurring hydration reminder.
///
/// Fields are only changed through the validated setters, which keep every
/// value inside the ranges the scheduler relies on. `next_trigger_at` is
/// always `None` while the reminder is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderConfig {
    pub(crate) enabled: bool,
    pub(crate) interval_minutes: u32,
    pub(crate) business_hour_start: u32,
    pub(crate) business_hour_end: u32,
    pub(crate) weekdays_only: bool,
    pub(crate) use_notifications: bool,
    pub(crate) custom_message: String,
    pub(crate) next_trigger_at: Option<DateTime<Utc>>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            business_hour_start: DEFAULT_BUSINESS_HOUR_START,
            business_hour_end: DEFAULT_BUSINESS_HOUR_END,
            weekdays_only: true,
            use_notifications: false,
            custom_message: String::new(),
            next_trigger_at: None,
        }
    }
}

impl ReminderConfig {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn business_hour_start(&self) -> u32 {
        self.business_hour_start
    }

    pub fn business_hour_end(&self) -> u32 {
        self.business_hour_end
    }

    pub fn weekdays_only(&self) -> bool {
        self.weekdays_only
    }

    pub fn use_notifications(&self) -> bool {
        self.use_notifications
    }

    pub fn custom_message(&self) -> &str {
        &self.custom_message
    }

    pub fn next_trigger_at(&self) -> Option<DateTime<Utc>> {
        self.next_trigger_at
    }

    /// Text delivered when the reminder fires.
    pub fn message(&self) -> &str {
        let custom = self.custom_message.trim();
        if custom.is_empty() {
            DEFAULT_HYDRATION_MESSAGE
        } else {
            custom
        }
    }

    /// Disabling also clears the pending trigger.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.next_trigger_at = None;
        }
    }

    pub fn set_interval_minutes(&mut self, minutes: i64) {
        self.interval_minutes = crate::storage::validation::validate_interval(Some(minutes as f64));
    }

    pub fn set_business_hours(&mut self, start: i64, end: i64) {
        use crate::storage::validation::validate_hour;

        self.business_hour_start = validate_hour(Some(start as f64), DEFAULT_BUSINESS_HOUR_START);
        self.business_hour_end = validate_hour(Some(end as f64), DEFAULT_BUSINESS_HOUR_END);
    }

    pub fn set_weekdays_only(&mut self, weekdays_only: bool) {
        self.weekdays_only = weekdays_only;
    }

    pub fn set_use_notifications(&mut self, use_notifications: bool) {
        self.use_notifications = use_notifications;
    }

    pub fn set_custom_message(&mut self, message: impl Into<String>) {
        self.custom_message = message.into();
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        let (interval, start, end) = preset.values();
        self.set_interval_minutes(interval.into());
        self.set_business_hours(start.into(), end.into());
    }

    /// Ignored while disabled.
    pub fn set_next_trigger_at(&mut self, next_trigger_at: Option<DateTime<Utc>>) {
        if self.enabled {
            self.next_trigger_at = next_trigger_at;
        } else {
            self.next_trigger_at = None;
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Preset {
    TwoHours,
    Hourly,
    HalfHour,
}

impl Preset {
    /// `(interval minutes, business hour start, business hour end)`
    pub fn values(&self) -> (u32, u32, u32) {
        match self {
            Preset::TwoHours => (120, 9, 17),
            Preset::Hourly => (60, 9, 17),
            Preset::HalfHour => (30, 13, 17),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2h" | "two-hours" => Ok(Preset::TwoHours),
            "hourly" | "1h" => Ok(Preset::Hourly),
            "30m" | "half-hour" => Ok(Preset::HalfHour),
            other => anyhow::bail!("Unknown preset {other}"),
        }
    }
}
