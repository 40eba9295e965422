//! Week-boundary and month-window date rules.
//!
//! # Responsibility
//! - Compute ISO week starts (Monday 00:00) and weekly reset eligibility.
//! - Format calendar days and enumerate the days of a month.
//! - Describe the three-month window used to prune monthly tasks.
//!
//! # Invariants
//! - Every function is pure: "now" is always an explicit argument.
//! - Weekdays exposed to callers use `0 = Sunday ..= 6 = Saturday`.
//! - Months exposed to callers are 1-based.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One cell of a month calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Day of month, starting at 1.
    pub day_number: u32,
    /// `0 = Sunday ..= 6 = Saturday`.
    pub weekday: u8,
    pub is_today: bool,
}

/// Returns the epoch-ms timestamp of Monday 00:00:00 of the week containing
/// `date`, evaluated in `date`'s time zone.
///
/// Sunday belongs to the week that started six days earlier.
pub fn start_of_week<Tz: TimeZone>(date: &DateTime<Tz>) -> i64 {
    let local_date = date.date_naive();
    let days_since_monday = i64::from(local_date.weekday().num_days_from_monday());
    let monday = local_date - Duration::days(days_since_monday);
    local_midnight_ms(&date.timezone(), monday.and_time(NaiveTime::MIN))
}

/// Returns whether a weekly reset is due.
///
/// `None` stands for a missing or non-numeric marker and always counts as a
/// new week.
pub fn is_new_week<Tz: TimeZone>(last_reset: Option<i64>, now: &DateTime<Tz>) -> bool {
    match last_reset {
        Some(last_reset) => last_reset < start_of_week(now),
        None => true,
    }
}

/// Formats a calendar day as `YYYY-MM-DD`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Formats an epoch-ms timestamp as `YYYY-MM-DD` in `tz`.
///
/// Returns an empty string when the timestamp is outside the representable range.
pub fn format_epoch_ms<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> String {
    match tz.timestamp_millis_opt(epoch_ms).single() {
        Some(instant) => format_date(&instant.date_naive()),
        None => String::new(),
    }
}

/// Enumerates every day of `year`/`month` in ascending order.
///
/// Missing arguments default to the year/month of `now`; an invalid month
/// (outside `1..=12`) yields an empty list.
pub fn calendar_days_of_month<Tz: TimeZone>(
    year: Option<i32>,
    month: Option<u32>,
    now: &DateTime<Tz>,
) -> Vec<CalendarDay> {
    let today = now.date_naive();
    let target_year = year.unwrap_or_else(|| today.year());
    let target_month = month.unwrap_or_else(|| today.month());

    let Some(first) = NaiveDate::from_ymd_opt(target_year, target_month, 1) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|day| day.month() == target_month)
        .map(|day| CalendarDay {
            date: format_date(&day),
            day_number: day.day(),
            weekday: day.weekday().num_days_from_sunday() as u8,
            is_today: day == today,
        })
        .collect()
}

/// Returns the `YYYY-MM` keys of the previous, current and next month of `now`.
pub fn month_window<Tz: TimeZone>(now: &DateTime<Tz>) -> [String; 3] {
    let today = now.date_naive();
    let (year, month) = (today.year(), today.month());
    let (prev_year, prev_month) = if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    [
        month_key(prev_year, prev_month),
        month_key(year, month),
        month_key(next_year, next_month),
    ]
}

/// Formats a `YYYY-MM` month key.
pub fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

fn local_midnight_ms<Tz: TimeZone>(tz: &Tz, midnight: NaiveDateTime) -> i64 {
    if let Some(instant) = tz.from_local_datetime(&midnight).earliest() {
        return instant.timestamp_millis();
    }
    // Midnight skipped by a DST jump: use the offset in effect at that wall time.
    let offset_secs = tz.offset_from_utc_datetime(&midnight).fix().local_minus_utc();
    midnight.and_utc().timestamp_millis() - i64::from(offset_secs) * 1_000
}
