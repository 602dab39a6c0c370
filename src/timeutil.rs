//! Timestamps found in log tags, and the text form of start/end controls.
//!
//! Logs disagree on how they write time. Some carry a full date, some only a
//! clock reading. Clock-only stamps are anchored to 1970-01-01 ("undated")
//! while parsing and later moved onto the calendar of the dated logs by
//! [`reconcile_dates`].
//!
//! Time controls are written relative to a *reference date*, so users type
//! `06:53:11` or `00:01:02 (+1day)` instead of a full date:
//!
//! ```text
//! 2021-11-12 06:53:11.230      full date and time
//! 06:53:11                     clock time on the reference date
//! 06:53:11.230 (+1day)         clock time N days after the reference date
//! +5s  -10 minutes  +2 h       relative to the other bound
//! ```

use crate::parser::Record;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

/// Why a start/end control could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeControlError {
    #[error("expected yyyy-mm-dd hh:mm:ss")]
    ExpectedDateTime,
    #[error("expected hh:mm:ss")]
    ExpectedClock,
    #[error("expected hh:mm:ss (+Ndays)")]
    ExpectedDayOffset,
    #[error("no log messages have any times in them")]
    NoReferenceDate,
    #[error("need start for +N relative times")]
    NeedStart,
    #[error("expected +N h|m|s")]
    ExpectedRelative,
    #[error("expected hh:mm:ss or +N h|m|s")]
    Unrecognized,
    #[error("invalid date or time")]
    InvalidDateTime,
}

const UNDATED_YEAR: i32 = 1970;
const DAY_MS: i64 = 86_400_000;

static FULL_WITH_MILLIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<y>\d{4})-(?P<m>\d{2})-(?P<d>\d{2})[ T](?P<hh>\d{2}):(?P<mm>\d{2}):(?P<ss>\d{2}).(?P<ms>\d{3})")
        .expect("valid dated millis regex")
});
static FULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<y>\d{4})-(?P<m>\d{2})-(?P<d>\d{2})[ T](?P<hh>\d{2}):(?P<mm>\d{2}):(?P<ss>\d{2})")
        .expect("valid dated regex")
});
static SLASH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<m>\d+)/(?P<d>\d+)/(?P<y>\d+), (?P<hh>\d+):(?P<mm>\d+):(?P<ss>\d+)(?: (?P<ampm>AM|PM))?")
        .expect("valid slash date regex")
});
static AM_PM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<hh>\d+):(?P<mm>\d+):(?P<ss>\d+) (?P<ampm>AM|PM)").expect("valid am/pm regex")
});
static CLOCK_WITH_MILLIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<hh>\d{2}):(?P<mm>\d{2}):(?P<ss>\d{2}).(?P<ms>\d{3})")
        .expect("valid clock millis regex")
});
static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<hh>\d{2}):(?P<mm>\d{2}):(?P<ss>\d{2})").expect("valid clock regex")
});

/// Patterns tried against a tag, most specific first.
///
/// The slash and AM/PM forms must stay ahead of the bare clock forms: those
/// would match the `hh:mm:ss` inside them and lose the date or the PM.
static LOG_TIME_PATTERNS: LazyLock<[&'static Regex; 6]> = LazyLock::new(|| {
    [
        &*FULL_WITH_MILLIS_RE,
        &*FULL_RE,
        &*SLASH_DATE_RE,
        &*AM_PM_RE,
        &*CLOCK_WITH_MILLIS_RE,
        &*CLOCK_RE,
    ]
});

static CONTROL_STARTS_WITH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{3}|\d+/)").expect("valid date prefix regex"));
static CONTROL_DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<y>\d+)-(?P<m>\d+)-(?P<d>\d+) (?P<hh>\d+):(?P<mm>\d+):(?P<ss>\d+)(?:\.(?P<ms>\d{3}))?$")
        .expect("valid control date regex")
});
static CONTROL_CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<hh>\d+):(?P<mm>\d+):(?P<ss>\d+)(?:\.(?P<ms>\d{3}))?(?P<rest>.*)$")
        .expect("valid control clock regex")
});
static CONTROL_DAY_OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ \((?P<sign>[+-])?(?P<days>\d+) ?(?:d|day|days)?\)$")
        .expect("valid day offset regex")
});
static CONTROL_RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[+-])(?P<n>\d+) ?(?P<unit>s|sec|secs|second|seconds|m|min|mins|minute|minutes|h|hour|hours)$")
        .expect("valid relative time regex")
});

/// Finds a timestamp anywhere inside `text`. Missing date parts default to
/// 1970-01-01. Returns `None` for text with no time or with out-of-range
/// components.
pub fn try_parse_log_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let caps = LOG_TIME_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(text))?;

    let y = group_or(&caps, "y", UNDATED_YEAR as u32)? as i32;
    let m = group_or(&caps, "m", 1)?;
    let d = group_or(&caps, "d", 1)?;
    let mut hh = group_or(&caps, "hh", 0)?;
    let mm = group_or(&caps, "mm", 0)?;
    let ss = group_or(&caps, "ss", 0)?;
    let ms = group_or(&caps, "ms", 0)?;

    match caps.name("ampm").map(|am_pm| am_pm.as_str()) {
        Some("PM") if hh < 12 => hh += 12,
        Some("AM") if hh == 12 => hh = 0,
        _ => {}
    }

    build_time(y, m, d, hh, mm, ss, ms)
}

/// True for times that came from a clock-only stamp and have not been
/// reconciled onto a real date.
pub fn is_undated(time: &DateTime<Utc>) -> bool {
    time.year() == UNDATED_YEAR
}

pub fn midnight(time: &DateTime<Utc>) -> DateTime<Utc> {
    time.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Moves an undated `time` forward by whole days until it is no earlier than
/// `prev`. Dated times are returned unchanged.
pub fn roll_past(time: DateTime<Utc>, prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let Some(prev) = prev else {
        return time;
    };
    if !is_undated(&time) || time >= prev {
        return time;
    }
    let behind = (prev - time).num_milliseconds();
    let days = (behind + DAY_MS - 1) / DAY_MS;
    TimeDelta::try_days(days)
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(time)
}

/// Midnight of the first dated record. Sets made only of undated records
/// fall back to the first record that has any time at all.
pub fn reference_date(records: &[Record]) -> Option<DateTime<Utc>> {
    let first = records.iter().find_map(|r| r.time)?;
    let reference = records
        .iter()
        .filter_map(|r| r.time)
        .find(|t| !is_undated(t))
        .unwrap_or(first);
    Some(midnight(&reference))
}

/// Shifts every undated time onto the calendar of the earliest dated one.
/// No-op when nothing is dated.
pub fn reconcile_dates(records: &mut [Record]) {
    let Some(earliest) = records
        .iter()
        .filter_map(|r| r.time)
        .filter(|t| !is_undated(t))
        .min()
    else {
        return;
    };
    let offset = TimeDelta::milliseconds(midnight(&earliest).timestamp_millis());
    let mut shifted = 0usize;
    for record in records.iter_mut() {
        let Some(time) = record.time.filter(is_undated) else {
            continue;
        };
        if let Some(moved) = time.checked_add_signed(offset) {
            record.time = Some(moved);
            shifted += 1;
        }
    }
    if shifted > 0 {
        log::debug!(
            "moved {shifted} undated times onto {}",
            earliest.date_naive()
        );
    }
}

/// `HH:MM:SS` without date or milliseconds.
pub fn format_compact_time(time: &DateTime<Utc>) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// Renders `time` the way a user would type it into a time control.
pub fn format_time_control(time: &DateTime<Utc>, records: &[Record]) -> String {
    let millis = time.timestamp_subsec_millis();
    let mut text = format_compact_time(time);
    if millis != 0 {
        text.push_str(&format!(".{millis:03}"));
    }
    let Some(reference) = reference_date(records) else {
        return text;
    };
    let days = (time.date_naive() - reference.date_naive()).num_days();
    if days == 0 {
        return text;
    }
    let sign = if days > 0 { '+' } else { '-' };
    let unit = if days.abs() == 1 { "day" } else { "days" };
    format!("{text} ({sign}{}{unit})", days.abs())
}

/// Parses a start/end control.
///
/// Empty text means "no bound". Clock forms need a reference date from
/// `records`; relative forms need `relative_to`, the other bound.
pub fn parse_time_control(
    text: &str,
    records: &[Record],
    relative_to: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, TimeControlError> {
    if text.is_empty() {
        return Ok(None);
    }

    if CONTROL_STARTS_WITH_DATE_RE.is_match(text) {
        let caps = CONTROL_DATE_TIME_RE
            .captures(text)
            .ok_or(TimeControlError::ExpectedDateTime)?;
        let y = required(&caps, "y")? as i32;
        let time = build_time(
            y,
            required(&caps, "m")?,
            required(&caps, "d")?,
            required(&caps, "hh")?,
            required(&caps, "mm")?,
            required(&caps, "ss")?,
            optional(&caps, "ms")?,
        )
        .ok_or(TimeControlError::InvalidDateTime)?;
        return Ok(Some(time));
    }

    if text.starts_with(|c: char| c.is_ascii_digit()) {
        let caps = CONTROL_CLOCK_RE
            .captures(text)
            .ok_or(TimeControlError::ExpectedClock)?;
        let reference = reference_date(records).ok_or(TimeControlError::NoReferenceDate)?;
        let time = build_time(
            reference.year(),
            reference.month(),
            reference.day(),
            required(&caps, "hh")?,
            required(&caps, "mm")?,
            required(&caps, "ss")?,
            optional(&caps, "ms")?,
        )
        .ok_or(TimeControlError::InvalidDateTime)?;

        let rest = caps.name("rest").map_or("", |rest| rest.as_str());
        if rest.is_empty() {
            return Ok(Some(time));
        }
        let offset = CONTROL_DAY_OFFSET_RE
            .captures(rest)
            .ok_or(TimeControlError::ExpectedDayOffset)?;
        let days = i64::from(required(&offset, "days")?);
        let days = if offset.name("sign").is_some_and(|s| s.as_str() == "-") {
            -days
        } else {
            days
        };
        return TimeDelta::try_days(days)
            .and_then(|delta| time.checked_add_signed(delta))
            .map(Some)
            .ok_or(TimeControlError::InvalidDateTime);
    }

    if text.starts_with(['+', '-']) {
        let base = relative_to.ok_or(TimeControlError::NeedStart)?;
        let caps = CONTROL_RELATIVE_RE
            .captures(text)
            .ok_or(TimeControlError::ExpectedRelative)?;
        let n = i64::from(required(&caps, "n")?);
        let n = if &caps["sign"] == "-" { -n } else { n };
        let delta = match caps["unit"].chars().next() {
            Some('s') => TimeDelta::try_seconds(n),
            Some('m') => TimeDelta::try_minutes(n),
            Some('h') => TimeDelta::try_hours(n),
            _ => None,
        };
        return delta
            .and_then(|delta| base.checked_add_signed(delta))
            .map(Some)
            .ok_or(TimeControlError::InvalidDateTime);
    }

    Err(TimeControlError::Unrecognized)
}

fn build_time(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32, ms: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(y, m, d)?
        .and_hms_milli_opt(hh, mm, ss, ms)
        .map(|naive| naive.and_utc())
}

fn group_or(caps: &Captures<'_>, name: &str, default: u32) -> Option<u32> {
    match caps.name(name) {
        Some(group) => group.as_str().parse().ok(),
        None => Some(default),
    }
}

fn required(caps: &Captures<'_>, name: &str) -> Result<u32, TimeControlError> {
    caps.name(name)
        .and_then(|group| group.as_str().parse().ok())
        .ok_or(TimeControlError::InvalidDateTime)
}

fn optional(caps: &Captures<'_>, name: &str) -> Result<u32, TimeControlError> {
    match caps.name(name) {
        Some(group) => group
            .as_str()
            .parse()
            .map_err(|_| TimeControlError::InvalidDateTime),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, ss).unwrap()
    }

    #[test]
    fn parses_dated_stamp_with_millis() {
        let t = try_parse_log_timestamp("2021-11-12 06:53:11.230").unwrap();
        assert_eq!(t, utc(2021, 11, 12, 6, 53, 11) + TimeDelta::milliseconds(230));
    }

    #[test]
    fn clock_only_stamp_is_undated() {
        let t = try_parse_log_timestamp("06:53:11").unwrap();
        assert_eq!(t, utc(1970, 1, 1, 6, 53, 11));
        assert!(is_undated(&t));
    }

    #[test]
    fn pm_stamps_move_to_the_afternoon() {
        assert_eq!(
            try_parse_log_timestamp("9:43:06 PM"),
            Some(utc(1970, 1, 1, 21, 43, 6))
        );
        assert_eq!(
            try_parse_log_timestamp("10/26/2021, 12:05:00 AM"),
            Some(utc(2021, 10, 26, 0, 5, 0))
        );
        assert_eq!(
            try_parse_log_timestamp("10:43:06 PM"),
            Some(utc(1970, 1, 1, 22, 43, 6))
        );
    }

    #[test]
    fn rejects_text_without_a_time() {
        assert_eq!(try_parse_log_timestamp("client"), None);
        assert_eq!(try_parse_log_timestamp("99:99:99"), None);
    }

    #[test]
    fn rollover_advances_whole_days() {
        let prev = utc(1970, 1, 1, 23, 50, 0);
        let rolled = roll_past(utc(1970, 1, 1, 0, 2, 0), Some(prev));
        assert_eq!(rolled, utc(1970, 1, 2, 0, 2, 0));

        let dated = utc(2021, 1, 1, 0, 2, 0);
        assert_eq!(roll_past(dated, Some(utc(2021, 1, 1, 23, 0, 0))), dated);
    }
}
