use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::countdown::CountdownState;
use crate::models::reminder::{
    DEFAULT_BUSINESS_HOUR_END, DEFAULT_BUSINESS_HOUR_START, ReminderConfig,
};

use super::key_value::KeyValueStorage;
use super::validation::{
    coerce_number, is_truthy, parse_timestamp, validate_hour, validate_interval,
    validate_remaining, validate_target_duration,
};

/// A flat record that can be rebuilt field by field from loosely typed JSON.
pub trait PersistedRecord: Default + Serialize + Send + Sync + 'static {
    /// Missing or invalid fields fall back to their defaults individually.
    fn from_raw(raw: &Map<String, Value>) -> Self;

    fn sanitized(&self) -> Self;
}

impl PersistedRecord for ReminderConfig {
    fn from_raw(raw: &Map<String, Value>) -> Self {
        let enabled = raw.get("enabled").is_some_and(is_truthy);
        let weekdays_only = match raw.get("weekdaysOnly") {
            None | Some(Value::Null) => true,
            Some(value) => is_truthy(value),
        };
        let custom_message = match raw.get("customMessage") {
            Some(Value::String(message)) => message.clone(),
            _ => String::new(),
        };

        Self {
            enabled,
            interval_minutes: validate_interval(coerce_number(raw.get("intervalMinutes"))),
            business_hour_start: validate_hour(
                coerce_number(raw.get("businessHourStart")),
                DEFAULT_BUSINESS_HOUR_START,
            ),
            business_hour_end: validate_hour(
                coerce_number(raw.get("businessHourEnd")),
                DEFAULT_BUSINESS_HOUR_END,
            ),
            weekdays_only,
            use_notifications: raw.get("useNotifications").is_some_and(is_truthy),
            custom_message,
            next_trigger_at: if enabled {
                parse_timestamp(raw.get("nextTriggerAt"))
            } else {
                None
            },
        }
    }

    fn sanitized(&self) -> Self {
        let mut config = self.clone();
        config.interval_minutes = validate_interval(Some(f64::from(self.interval_minutes)));
        config.business_hour_start = validate_hour(
            Some(f64::from(self.business_hour_start)),
            DEFAULT_BUSINESS_HOUR_START,
        );
        config.business_hour_end = validate_hour(
            Some(f64::from(self.business_hour_end)),
            DEFAULT_BUSINESS_HOUR_END,
        );
        if !config.enabled {
            config.next_trigger_at = None;
        }
        config
    }
}

impl PersistedRecord for CountdownState {
    fn from_raw(raw: &Map<String, Value>) -> Self {
        let started_at_wall_clock = parse_timestamp(raw.get("startedAtWallClock"));
        let running = raw.get("running").is_some_and(is_truthy) && started_at_wall_clock.is_some();

        Self {
            target_duration_seconds: validate_target_duration(coerce_number(
                raw.get("targetDurationSeconds"),
            )),
            remaining_seconds: validate_remaining(coerce_number(raw.get("remainingSeconds"))),
            running,
            started_at_wall_clock: started_at_wall_clock.filter(|_| running),
            completed_while_away: raw.get("completedWhileAway").is_some_and(is_truthy),
        }
    }

    fn sanitized(&self) -> Self {
        let mut state = self.clone();
        state.target_duration_seconds =
            validate_target_duration(Some(self.target_duration_seconds as f64));
        if state.started_at_wall_clock.is_none() {
            state.running = false;
        }
        if !state.running {
            state.started_at_wall_clock = None;
        }
        state
    }
}

/// Loads and saves one persisted record under a fixed key.
///
/// Storage failures are logged and absorbed: the caller keeps working on
/// in-memory values. Saving is a no-op until the record has been loaded once,
/// so startup defaults can never overwrite what is already stored.
pub struct SettingsStore<T> {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    initialized: bool,
    _marker: PhantomData<T>,
}

impl<T: PersistedRecord> SettingsStore<T> {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            initialized: false,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub async fn load(&mut self) -> T {
        let record = match self.storage.get_item(&self.key).await {
            Ok(Some(raw)) => self.parse(&raw),
            Ok(None) => {
                log::debug!("No persisted record, using defaults [key = {}]", self.key);
                T::default()
            }
            Err(error) => {
                log::error!(
                    "Storage unavailable, continuing with in-memory defaults [key = {}, error = {}]",
                    self.key,
                    error
                );
                T::default()
            }
        };

        self.initialized = true;
        record
    }

    pub async fn save(&self, record: &T) {
        if !self.initialized {
            log::debug!("Skipping save before first load [key = {}]", self.key);
            return;
        }

        let raw = match serde_json::to_string(&record.sanitized()) {
            Ok(raw) => raw,
            Err(error) => {
                log::error!("Could not serialize record [key = {}, error = {}]", self.key, error);
                return;
            }
        };

        if let Err(error) = self.storage.set_item(&self.key, &raw).await {
            log::error!(
                "Could not persist record, keeping it in memory [key = {}, error = {}]",
                self.key,
                error
            );
        }
    }

    fn parse(&self, raw: &str) -> T {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => T::from_raw(&fields),
            Ok(other) => {
                log::warn!(
                    "Persisted record is not an object, using defaults [key = {}, value = {}]",
                    self.key,
                    other
                );
                T::default()
            }
            Err(error) => {
                log::warn!(
                    "Persisted record is not valid JSON, using defaults [key = {}, error = {}]",
                    self.key,
                    error
                );
                T::default()
            }
        }
    }
}
