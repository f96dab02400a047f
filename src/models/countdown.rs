use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_HOUR: u64 = 3600;
pub const MIN_TARGET_HOURS: u32 = 1;
pub const MAX_TARGET_HOURS: u32 = 10;
pub const DEFAULT_TARGET_DURATION_SECONDS: u64 = SECONDS_PER_HOUR;

/// Persisted state of the outdoor-time countdown.
///
/// While running, `remaining_seconds` is the remaining time as of
/// `started_at_wall_clock`; the live value comes from reconciling against
/// the current time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub target_duration_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
    pub started_at_wall_clock: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_while_away: bool,
}

impl Default for CountdownState {
    fn default() -> Self {
        Self {
            target_duration_seconds: DEFAULT_TARGET_DURATION_SECONDS,
            remaining_seconds: 0,
            running: false,
            started_at_wall_clock: None,
            completed_while_away: false,
        }
    }
}

impl CountdownState {
    pub fn target_hours(&self) -> u64 {
        self.target_duration_seconds / SECONDS_PER_HOUR
    }
}
