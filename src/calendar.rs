//! UTC calendar arithmetic. Every `HH:MM` is read on the UTC day of the date
//! it is paired with; nothing here consults the local timezone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::model::{Ms, Span};

pub const MINUTE_MS: Ms = 60_000;
pub const DAY_MS: Ms = 24 * 60 * MINUTE_MS;

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Minutes since midnight for a strict `HH:MM` between 00:00 and 23:59.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Format the UTC time-of-day of `ms` as `HH:MM`.
pub fn format_hhmm(ms: Ms) -> String {
    let minutes = ms.rem_euclid(DAY_MS) / MINUTE_MS;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Parse a booking start time: RFC 3339 with any offset, or a naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<Ms> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// RFC 3339 rendering with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

/// 0 = Sunday … 6 = Saturday.
pub fn weekday(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// The UTC calendar day containing `ms`.
pub fn date_of(ms: Ms) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

pub fn day_start(date: NaiveDate) -> Ms {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()
}

/// The whole UTC day `[00:00, 24:00)`.
pub fn day_span(date: NaiveDate) -> Span {
    let start = day_start(date);
    Span::new(start, start + DAY_MS)
}

/// `date` at `minutes` past UTC midnight.
pub fn at_minutes(date: NaiveDate, minutes: u32) -> Ms {
    day_start(date) + Ms::from(minutes) * MINUTE_MS
}
