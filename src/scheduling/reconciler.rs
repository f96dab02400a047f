use chrono::{DateTime, TimeDelta, Utc};

use crate::models::countdown::CountdownState;

/// Brings a running countdown up to `now`.
///
/// The elapsed whole seconds since `started_at_wall_clock` are subtracted from
/// `remaining_seconds` and the start is moved forward by the same amount, so
/// reconciling repeatedly gives the same result as reconciling once. A clock
/// that went backwards counts as no time elapsed. A countdown that reaches zero
/// stops and is flagged as completed while away.
pub fn reconcile(persisted: &CountdownState, now: DateTime<Utc>) -> CountdownState {
    let mut state = persisted.clone();
    let Some(started_at) = persisted.started_at_wall_clock.filter(|_| persisted.running) else {
        return state;
    };

    let elapsed = u64::try_from((now - started_at).num_seconds()).unwrap_or(0);
    state.remaining_seconds = persisted.remaining_seconds.saturating_sub(elapsed);

    if state.remaining_seconds == 0 {
        state.running = false;
        state.started_at_wall_clock = None;
        state.completed_while_away = true;
    } else {
        let consumed = TimeDelta::seconds(elapsed.try_into().unwrap_or(i64::MAX));
        state.started_at_wall_clock = started_at.checked_add_signed(consumed).or(Some(now));
    }

    state
}
