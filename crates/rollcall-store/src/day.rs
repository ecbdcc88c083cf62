//! Operational day: the calendar day under a fixed UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid UTC offset {0:?}: expected ±HH:MM (e.g. \"+05:30\") or \"Z\"")]
pub struct InvalidOffset(pub String);

/// Parse `±HH:MM`, `±HHMM`, `±HH` or `Z`.
pub fn parse_utc_offset(text: &str) -> Result<FixedOffset, InvalidOffset> {
    let invalid = || InvalidOffset(text.to_string());
    let trimmed = text.trim();

    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// The calendar day `now` falls on under `offset`.
pub fn operational_day(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}
