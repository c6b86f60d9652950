// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! Day boundaries are computed in the host's local timezone: a bare date
//! such as `2024-03-10` means local midnight of that calendar day, and the
//! resulting instant is used unchanged as the UTC query bound. Both the
//! API query bounds and the client-side window filter go through here.

use chrono::{
    DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Local midnight of the given date.
///
/// Returns `None` for unparseable input; callers must skip the bounded
/// query in that case.
pub fn start_of_day_utc(input: &str) -> Option<DateTime<Utc>> {
    start_of_day_in(&Local, input)
}

/// Local 23:59:59.999 of the given date.
///
/// Unparseable input falls back to the current instant.
pub fn end_of_day_utc(input: &str) -> DateTime<Utc> {
    end_of_day_in(&Local, input).unwrap_or_else(Utc::now)
}

/// [`start_of_day_utc`] against an explicit timezone.
pub fn start_of_day_in<Tz: TimeZone>(tz: &Tz, input: &str) -> Option<DateTime<Utc>> {
    let date = calendar_date_in(tz, input)?;
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// [`end_of_day_utc`] against an explicit timezone, without the fallback.
pub fn end_of_day_in<Tz: TimeZone>(tz: &Tz, input: &str) -> Option<DateTime<Utc>> {
    let date = calendar_date_in(tz, input)?;
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    resolve_local(tz, date.and_time(end))
}

/// Closed UTC interval used for both API bounds and exact filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self { after, before }
    }

    /// Inclusive at both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.after && instant <= self.before
    }

    /// `after` as Unix seconds, the unit the Strava API takes.
    pub fn after_unix(&self) -> i64 {
        self.after.timestamp()
    }

    /// `before` as Unix seconds, rounded up so the last millisecond of the
    /// window is not excluded by the API.
    pub fn before_unix(&self) -> i64 {
        let secs = self.before.timestamp();
        if self.before.timestamp_subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Resolve a date or timestamp string to a calendar date in `tz`.
fn calendar_date_in<Tz: TimeZone>(tz: &Tz, input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(date) = parse_bare_date(input) {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(tz).date_naive());
    }

    // Timestamps without an offset are already local wall-clock time.
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.date())
}

/// `YYYY-MM-DD` or `YYYY/MM/DD`.
fn parse_bare_date(input: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = input.split(['-', '/']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times take the earlier instant; times skipped by a DST
/// transition move forward an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}
