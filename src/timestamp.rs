use crate::cell::format_number;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

lazy_static! {
    static ref DATE_CTOR_REGEX: Regex = Regex::new(r"^Date\(([^)]+)\)").unwrap();
    static ref SERIAL_REGEX: Regex = Regex::new(r"^-?\d+(\.\d+)?$").unwrap();
}

const MS_PER_DAY: f64 = 86_400_000.0;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%dT%H:%M:%S%.f%z"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%a %b %d %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%a %b %d %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// A timestamp split into display parts
///
/// `date` is always `YYYY-MM-DD` and `time` is `H:MM:SS` with an unpadded
/// hour, except for values no rule could read: those keep the raw text as
/// `date` and leave `time` empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimestampParts {
    pub date: String,
    pub time: String,
}

impl TimestampParts {
    pub fn from_datetime(value: &NaiveDateTime) -> Self {
        TimestampParts {
            date: value.format("%Y-%m-%d").to_string(),
            time: format!("{}:{:02}:{:02}", value.hour(), value.minute(), value.second()),
        }
    }

    fn passthrough(raw: String) -> Self {
        TimestampParts {
            date: raw,
            time: String::new(),
        }
    }

    /// The `"<date> / <time>"` label used to key records
    pub fn combined(&self) -> String {
        format!("{} / {}", self.date, self.time)
    }
}

/// A timestamp value whose encoding is not known up front
#[derive(Clone, Debug, PartialEq)]
pub enum RawTimestamp {
    Absent,
    DateTime(NaiveDateTime),
    Number(f64),
    Text(String),
}

impl From<&Value> for RawTimestamp {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null | Value::Bool(false) => RawTimestamp::Absent,
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawTimestamp::Number(f),
                None => RawTimestamp::Text(n.to_string()),
            },
            Value::String(s) => RawTimestamp::Text(s.clone()),
            other => RawTimestamp::Text(other.to_string()),
        }
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        RawTimestamp::DateTime(value)
    }
}

/// Decompose a timestamp of unknown encoding into date and time parts
///
/// The first applicable rule wins:
/// 1. absent or empty → both parts empty
/// 2. a native date-time → formatted directly
/// 3. `Date(y, m, d[, h, mi, s])` text with a zero-based month → read
///    positionally, out-of-range parts rolling over into the next unit
/// 4. a plain number → day-serial counted from 1899-12-30
/// 5. any other text → generic date parsing, or passed through as `date`
///
/// # Arguments
/// * `raw` - The value to decompose
///
/// # Returns
/// * `TimestampParts` - Never fails; unreadable input is passed through
///
/// # Examples
/// ```
/// use faultsheet::timestamp::{RawTimestamp, decompose_timestamp};
///
/// let parts = decompose_timestamp(&RawTimestamp::from("Date(2024,0,15,9,5,0)"));
/// assert_eq!(parts.date, "2024-01-15");
/// assert_eq!(parts.time, "9:05:00");
/// ```
pub fn decompose_timestamp(raw: &RawTimestamp) -> TimestampParts {
    match raw {
        RawTimestamp::Absent => TimestampParts::default(),
        RawTimestamp::DateTime(value) => TimestampParts::from_datetime(value),
        RawTimestamp::Number(n) if n.is_nan() => TimestampParts::default(),
        RawTimestamp::Number(n) => match serial_to_datetime(*n) {
            Some(value) => TimestampParts::from_datetime(&value),
            None => TimestampParts::passthrough(format_number(*n)),
        },
        RawTimestamp::Text(text) => decompose_text(text),
    }
}

/// Shorthand for decomposing a JSON cell value
pub fn decompose_value(value: &Value) -> TimestampParts {
    decompose_timestamp(&RawTimestamp::from(value))
}

fn decompose_text(text: &str) -> TimestampParts {
    let text = text.trim();
    if text.is_empty() {
        return TimestampParts::default();
    }

    if text.starts_with("Date(") {
        if let Some(value) = parse_date_constructor(text) {
            return TimestampParts::from_datetime(&value);
        }
    }

    if SERIAL_REGEX.is_match(text) {
        if let Some(value) = text.parse::<f64>().ok().and_then(serial_to_datetime) {
            return TimestampParts::from_datetime(&value);
        }
    }

    match parse_generic(text) {
        Some(value) => TimestampParts::from_datetime(&value),
        None => TimestampParts::passthrough(text.to_string()),
    }
}

/// Converts a spreadsheet day-serial into a date-time
///
/// Day zero is 1899-12-30, the epoch spreadsheets settled on so that their
/// phantom 1900-02-29 does not shift modern dates. The fractional part is the
/// time of day, rounded to the millisecond.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let ms = (serial * MS_PER_DAY).round();
    if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
        return None;
    }
    serial_epoch().checked_add_signed(TimeDelta::try_milliseconds(ms as i64)?)
}

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Reads `Date(year, month0, day[, hour, minute, second])`
///
/// Months count from zero. Values past their natural range roll over, so
/// `Date(2024,12,1)` is 2025-01-01 and `Date(2024,0,32)` is 2024-02-01.
/// Years 0 to 99 mean 1900 to 1999.
fn parse_date_constructor(text: &str) -> Option<NaiveDateTime> {
    let inner = DATE_CTOR_REGEX.captures(text)?.get(1)?.as_str();
    let parts = inner
        .split(',')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect::<Option<Vec<i64>>>()?;
    if parts.len() < 3 {
        return None;
    }
    let part = |idx: usize| parts.get(idx).copied().unwrap_or(0);

    let year = match part(0) {
        short @ 0..=99 => short + 1900,
        full => full,
    };
    let year = year.checked_add(part(1).div_euclid(12))?;
    let month = part(1).rem_euclid(12) as u32 + 1;
    let first =
        NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?.and_hms_opt(0, 0, 0)?;

    let offset = TimeDelta::try_days(part(2).checked_sub(1)?)?
        .checked_add(&TimeDelta::try_hours(part(3))?)?
        .checked_add(&TimeDelta::try_minutes(part(4))?)?
        .checked_add(&TimeDelta::try_seconds(part(5))?)?;
    first.checked_add_signed(offset)
}

/// Best-effort parsing of free-form date strings. Values carrying an offset
/// are converted to UTC.
fn parse_generic(text: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_utc());
    }
    if let Ok(value) = DateTime::parse_from_rfc2822(text) {
        return Some(value.naive_utc());
    }
    if let Some(value) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(value.naive_utc());
    }

    let text = text.strip_suffix('Z').unwrap_or(text);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
