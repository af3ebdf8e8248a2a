//! Shared helpers for timestamps, dates and paths.
//!
//! These are reused by the vault store, the service layer and the CLI.

use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Fixed-width ISO-8601 layout used for `created` / `modified`.
///
/// Six subsecond digits and an explicit offset keep the strings the same
/// length, so sorting them lexically sorts them chronologically.
const TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
);

const NAIVE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

const NAIVE_SECONDS_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Current time in the local offset, or UTC when the offset is unknown.
///
/// `time` refuses to read the local offset in some multi-threaded contexts.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Today's calendar date in the local offset.
pub fn today() -> Date {
    now_local().date()
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.ffffff+HH:MM`.
pub fn format_timestamp(dt: OffsetDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT)
        .or_else(|_| dt.format(&Rfc3339))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

/// Current local time as an ISO-8601 string.
pub fn now_timestamp() -> String {
    format_timestamp(now_local())
}

/// Parses a stored timestamp.
///
/// Accepts the store's own format, RFC 3339, and offset-less ISO-8601 strings
/// (interpreted in the local offset) as found in hand-written notes.
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(s, TIMESTAMP_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }

    let offset = now_local().offset();
    PrimitiveDateTime::parse(s, NAIVE_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(s, NAIVE_SECONDS_FORMAT))
        .ok()
        .map(|naive| naive.assume_offset(offset))
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    })
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s, DATE_FORMAT)
}

/// Returns at most `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, or systems without a home directory, are
/// returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Returns `true` if both timestamps fall on the same calendar day in `offset`.
pub fn same_local_day(a: OffsetDateTime, b: OffsetDateTime, offset: UtcOffset) -> bool {
    a.to_offset(offset).date() == b.to_offset(offset).date()
}
