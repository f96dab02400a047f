//! Next-trigger arithmetic under business-hour and weekday rules.
//!
//! Everything here is pure: the same `(now, config)` always yields the same
//! answer. Hours and weekdays are read in the time zone of `now`.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Weekday,
};

use crate::models::reminder::ReminderConfig;

const MAX_GAP_MINUTES: i64 = 24 * 60;

/// When the reminder should fire next, or `None` while it is disabled.
///
/// Inside the business window the next trigger is `now + interval`, unless
/// that lands outside the window, in which case the reminder waits for the
/// next window start. Outside the window it is always the next window start.
pub fn next_trigger<Tz: TimeZone>(
    now: &DateTime<Tz>,
    config: &ReminderConfig,
) -> Option<DateTime<Tz>> {
    if !config.enabled() {
        return None;
    }

    let window_start = || {
        next_business_window_start(now, config.business_hour_start(), config.weekdays_only())
    };

    if !is_within_business_window(now, config) {
        return window_start();
    }

    let candidate = now
        .clone()
        .checked_add_signed(TimeDelta::minutes(config.interval_minutes().into()));

    match candidate {
        Some(candidate) if is_within_business_window(&candidate, config) => Some(candidate),
        _ => window_start(),
    }
}

/// Half-open `[start, end)` hour test plus the weekday rule. An inverted or
/// empty window contains nothing.
pub fn is_within_business_window<Tz: TimeZone>(at: &DateTime<Tz>, config: &ReminderConfig) -> bool {
    let hour = at.hour();
    let in_hours = config.business_hour_start() <= hour && hour < config.business_hour_end();
    let allowed_day = !config.weekdays_only() || !is_weekend(at.weekday());

    in_hours && allowed_day
}

/// `start_hour:00` today if that is still ahead, otherwise tomorrow, moved
/// past the weekend when `weekdays_only` is set.
pub fn next_business_window_start<Tz: TimeZone>(
    from: &DateTime<Tz>,
    start_hour: u32,
    weekdays_only: bool,
) -> Option<DateTime<Tz>> {
    let mut date = from.date_naive();
    if from.hour() >= start_hour {
        date = date.succ_opt()?;
    }
    if weekdays_only {
        date = skip_weekend(date)?;
    }

    resolve_local(&from.timezone(), date.and_hms_opt(start_hour, 0, 0)?)
}

fn skip_weekend(mut date: NaiveDate) -> Option<NaiveDate> {
    while is_weekend(date.weekday()) {
        date = date.succ_opt()?;
    }
    Some(date)
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Maps a wall time onto the zone. A time skipped by a DST jump moves to the
/// first valid minute after it; a repeated time takes the earlier instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    (0..=MAX_GAP_MINUTES).find_map(|minutes| {
        let shifted = naive.checked_add_signed(TimeDelta::minutes(minutes))?;
        tz.from_local_datetime(&shifted).earliest()
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Utc};
    use chrono_tz::Europe::Prague;
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;
    use test_strategy::proptest;

    use super::*;

    fn config(interval: i64, start: i64, end: i64, weekdays_only: bool) -> ReminderConfig {
        let mut config = ReminderConfig::default();
        config.set_enabled(true);
        config.set_interval_minutes(interval);
        config.set_business_hours(start, end);
        config.set_weekdays_only(weekdays_only);
        config
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn saturday_morning_waits_for_monday() {
        // 2025-06-07 is a Saturday.
        let now = utc(2025, 6, 7, 10, 0);
        let next = next_trigger(&now, &config(120, 9, 17, true));

        assert_eq!(next, Some(utc(2025, 6, 9, 9, 0)));
    }

    #[test]
    fn candidate_past_closing_moves_to_next_day() {
        let now = utc(2025, 6, 3, 16, 30);
        let next = next_trigger(&now, &config(60, 9, 17, false));

        assert_eq!(next, Some(utc(2025, 6, 4, 9, 0)));
    }

    #[test]
    fn candidate_inside_window_is_used_as_is() {
        let now = utc(2025, 6, 3, 10, 15);
        let next = next_trigger(&now, &config(120, 9, 17, true));

        assert_eq!(next, Some(utc(2025, 6, 3, 12, 15)));
    }

    #[test]
    fn closing_hour_is_outside_the_window() {
        let cfg = config(30, 9, 17, false);
        assert!(!is_within_business_window(&utc(2025, 6, 3, 17, 0), &cfg));
        assert!(is_within_business_window(&utc(2025, 6, 3, 16, 59), &cfg));

        let now = utc(2025, 6, 3, 16, 30);
        assert_eq!(next_trigger(&now, &cfg), Some(utc(2025, 6, 4, 9, 0)));
    }

    #[test]
    fn before_opening_fires_at_opening_today() {
        let now = utc(2025, 6, 3, 7, 45);
        let next = next_trigger(&now, &config(120, 9, 17, true));

        assert_eq!(next, Some(utc(2025, 6, 3, 9, 0)));
    }

    #[test]
    fn friday_evening_skips_to_monday() {
        let now = utc(2025, 6, 6, 18, 0);
        let next = next_trigger(&now, &config(120, 9, 17, true));

        assert_eq!(next, Some(utc(2025, 6, 9, 9, 0)));
    }

    #[test]
    fn weekend_is_allowed_without_weekdays_only() {
        let now = utc(2025, 6, 7, 10, 0);
        let next = next_trigger(&now, &config(120, 9, 17, false));

        assert_eq!(next, Some(utc(2025, 6, 7, 12, 0)));
    }

    #[test]
    fn disabled_reminder_has_no_trigger() {
        let mut cfg = config(120, 9, 17, true);
        cfg.set_enabled(false);

        assert_eq!(next_trigger(&utc(2025, 6, 3, 10, 0), &cfg), None);
    }

    #[test]
    fn inverted_window_always_waits_for_the_start_hour() {
        let cfg = config(60, 17, 9, false);

        assert!(!is_within_business_window(&utc(2025, 6, 3, 20, 0), &cfg));
        assert!(!is_within_business_window(&utc(2025, 6, 3, 3, 0), &cfg));
        assert_eq!(
            next_trigger(&utc(2025, 6, 3, 20, 0), &cfg),
            Some(utc(2025, 6, 4, 17, 0))
        );
        assert_eq!(
            next_trigger(&utc(2025, 6, 3, 3, 0), &cfg),
            Some(utc(2025, 6, 3, 17, 0))
        );
    }

    #[test]
    fn window_start_in_dst_gap_moves_to_first_valid_time() {
        // Prague skips 02:00..03:00 on 2025-03-30.
        let now = Prague.with_ymd_and_hms(2025, 3, 29, 10, 0, 0).unwrap();
        let next = next_business_window_start(&now, 2, false).unwrap();

        assert_eq!(next, Prague.with_ymd_and_hms(2025, 3, 30, 3, 0, 0).unwrap());
    }

    #[test]
    fn repeated_window_start_takes_earlier_instant() {
        // Prague repeats 02:00..03:00 on 2025-10-26.
        let now = Prague.with_ymd_and_hms(2025, 10, 25, 10, 0, 0).unwrap();
        let next = next_business_window_start(&now, 2, false).unwrap();

        assert_eq!(next.with_timezone(&Utc), utc(2025, 10, 26, 0, 0));
    }

    #[test]
    fn business_hours_follow_the_local_zone() {
        // 07:30 UTC is 09:30 in Prague during summer time.
        let now = utc(2025, 6, 3, 7, 30).with_timezone(&Prague);
        let next = next_trigger(&now, &config(60, 9, 17, true)).unwrap();

        assert_eq!(next.with_timezone(&Utc), utc(2025, 6, 3, 8, 30));
    }

    fn moment(day_offset: u32, time: NaiveTime) -> DateTime<Utc> {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let date = monday + TimeDelta::days(day_offset.into());
        Utc.from_utc_datetime(&date.and_time(time))
    }

    fn interval_strategy() -> impl Strategy<Value = i64> {
        (1i64..=96).prop_map(|steps| steps * 15)
    }

    #[proptest]
    fn next_trigger_is_idempotent(
        #[strategy(0u32..14)] day: u32,
        #[strategy(arb::<NaiveTime>())] time: NaiveTime,
        #[strategy(interval_strategy())] interval: i64,
        #[strategy(0i64..24)] start: i64,
        #[strategy(0i64..24)] end: i64,
        weekdays_only: bool,
    ) {
        let now = moment(day, time);
        let cfg = config(interval, start, end, weekdays_only);

        prop_assert_eq!(next_trigger(&now, &cfg), next_trigger(&now, &cfg));
    }

    #[proptest]
    fn trigger_from_inside_window_stays_inside_window(
        #[strategy(0u32..14)] day: u32,
        #[strategy(arb::<NaiveTime>())] time: NaiveTime,
        #[strategy(interval_strategy())] interval: i64,
        #[strategy(0i64..23)] start: i64,
        #[strategy(#start + 1..24)] end: i64,
        weekdays_only: bool,
    ) {
        let now = moment(day, time);
        let cfg = config(interval, start, end, weekdays_only);
        prop_assume!(is_within_business_window(&now, &cfg));

        let next = next_trigger(&now, &cfg).unwrap();
        let candidate = now + TimeDelta::minutes(interval);

        prop_assert!(next > now);
        prop_assert!(is_within_business_window(&next, &cfg));
        if is_within_business_window(&candidate, &cfg) {
            prop_assert_eq!(next, candidate);
        } else {
            prop_assert_eq!(
                Some(next),
                next_business_window_start(&now, cfg.business_hour_start(), weekdays_only)
            );
        }
    }

    #[proptest]
    fn trigger_from_outside_window_is_next_window_start(
        #[strategy(0u32..14)] day: u32,
        #[strategy(arb::<NaiveTime>())] time: NaiveTime,
        #[strategy(interval_strategy())] interval: i64,
        #[strategy(0i64..23)] start: i64,
        #[strategy(#start + 1..24)] end: i64,
        weekdays_only: bool,
    ) {
        let now = moment(day, time);
        let cfg = config(interval, start, end, weekdays_only);
        prop_assume!(!is_within_business_window(&now, &cfg));

        let next = next_trigger(&now, &cfg).unwrap();

        prop_assert!(next > now);
        prop_assert_eq!(next.hour(), cfg.business_hour_start());
        prop_assert_eq!(next.minute(), 0);
        prop_assert!(is_within_business_window(&next, &cfg));
    }
}
