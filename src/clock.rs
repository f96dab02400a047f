use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of wall-clock "now" for the engines.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances together with tokio's clock.
///
/// On a paused runtime the wall time moves only when tokio time is advanced,
/// which makes timer tests deterministic.
pub struct AnchoredClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl AnchoredClock {
    pub fn starting_at(anchor_wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall,
            anchor_instant: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor_instant.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
