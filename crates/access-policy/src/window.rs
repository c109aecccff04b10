//! Time-window matching for zone schedules.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

use crate::schema::{TimeWindow, WindowRange};

/// Check whether `at` falls inside any range of `window`.
///
/// The timestamp is first shifted into the zone's local clock using
/// `utc_offset_minutes`, then truncated to the minute. A timestamp whose
/// local time falls outside chrono's representable range is never open.
pub fn is_open(window: &TimeWindow, at: DateTime<Utc>) -> bool {
    let shift = Duration::minutes(i64::from(window.utc_offset_minutes));
    let Some(local) = at.naive_utc().checked_add_signed(shift) else {
        tracing::trace!(%at, offset = window.utc_offset_minutes, "local time out of range");
        return false;
    };
    let day = local.weekday();
    let minute = local.hour() * 60 + local.minute();

    let open = window
        .ranges
        .iter()
        .any(|range| range_contains(range, day, minute));

    tracing::trace!(%local, ?day, open, "time window check");
    open
}

/// Check a single range against a local weekday and minute-of-day.
pub fn range_contains(range: &WindowRange, day: Weekday, minute: u32) -> bool {
    let start = minute_of_day(range.start);
    let end = minute_of_day(range.end);

    if start <= end {
        return applies_on(range, day) && start <= minute && minute <= end;
    }

    // Overnight: the evening part belongs to `day`, the early-morning part to
    // the day before.
    (minute >= start && applies_on(range, day)) || (minute <= end && applies_on(range, day.pred()))
}

fn applies_on(range: &WindowRange, day: Weekday) -> bool {
    range.days.is_empty() || range.days.contains(&day)
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}
