//! Wall-clock arithmetic for the timeline: day offsets, snapping and the pixel scale.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// 60 px per hour.
pub const DEFAULT_PIXELS_PER_MINUTE: f64 = 1.0;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// Minute offset of `instant` inside a day window opening at `day_start` o'clock.
/// Only the clock components are used, so the result does not depend on the date.
pub fn minutes_from_day_start(instant: NaiveDateTime, day_start: u32) -> i64 {
    i64::from(instant.hour()) * 60 + i64::from(instant.minute()) - i64::from(day_start) * 60
}

/// Rounds to the nearest multiple of `interval_minutes`; exact halves round up.
/// A zero interval leaves the instant untouched.
pub fn snap_to_interval(instant: NaiveDateTime, interval_minutes: u32) -> NaiveDateTime {
    if interval_minutes == 0 {
        return instant;
    }
    let step = i64::from(interval_minutes) * MILLIS_PER_MINUTE;
    let millis = instant.and_utc().timestamp_millis();
    let snapped = (millis + step / 2).div_euclid(step) * step;
    instant + Duration::milliseconds(snapped - millis)
}

/// Snaps unless fine adjustment is requested.
pub fn snap_or_raw(instant: NaiveDateTime, interval_minutes: u32, fine: bool) -> NaiveDateTime {
    if fine {
        instant
    } else {
        snap_to_interval(instant, interval_minutes)
    }
}

pub fn pixel_to_minutes(pixel_offset: f64, pixels_per_minute: f64) -> i64 {
    if pixels_per_minute <= 0.0 || !pixel_offset.is_finite() {
        return 0;
    }
    (pixel_offset / pixels_per_minute + 0.5).floor() as i64
}

pub fn minutes_to_pixels(minutes: i64, pixels_per_minute: f64) -> f64 {
    minutes as f64 * pixels_per_minute
}

/// Wall-clock instant `minutes` after `day_start:00` on `date`. Offsets past either
/// end of the day roll into the neighbouring day.
pub fn instant_at_offset(date: NaiveDate, day_start: u32, minutes: i64) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(day_start) * 60 + minutes)
}

/// Grid slots from `day_start` (inclusive) to `day_end` (exclusive).
pub fn time_slots(
    date: NaiveDate,
    day_start: u32,
    day_end: u32,
    interval_minutes: u32,
) -> Vec<NaiveDateTime> {
    if interval_minutes == 0 || day_end <= day_start {
        return Vec::new();
    }
    let end = instant_at_offset(date, day_end, 0);
    let step = Duration::minutes(i64::from(interval_minutes));
    let mut cursor = instant_at_offset(date, day_start, 0);
    let mut slots = Vec::new();
    while cursor < end {
        slots.push(cursor);
        cursor += step;
    }
    slots
}

/// Parses manual "HH:MM" entry.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
