//! Execution date/time normalization.
//!
//! Date and time cells arrive as structured values, text, or spreadsheet
//! serial numbers. [`normalize_exec_instant`] folds every shape into one local
//! `NaiveDateTime` or a [`FieldParseError`]; the checks never look at raw cells.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use trv_layout::CellValue;

const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y"];
const TIME_FORMATS: [&str; 6] = [
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H.%M.%S%.f",
    "%H.%M.%S",
    "%H:%M",
    "%H.%M",
];

/// Serial day 0 of the spreadsheet date system (1900 system, leap-bug adjusted).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// 9999-12-31 in the same system.
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParseError {
    MissingDate,
    UnparseableDate(String),
    UnparseableTime(String),
}

impl fmt::Display for FieldParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldParseError::MissingDate => write!(f, "execution date missing"),
            FieldParseError::UnparseableDate(v) => write!(f, "unparseable execution date: {v}"),
            FieldParseError::UnparseableTime(v) => write!(f, "unparseable execution time: {v}"),
        }
    }
}

impl std::error::Error for FieldParseError {}

/// Combine an order's execution date and time cells into one local instant.
///
/// An empty time cell means start of day, unless the date cell itself carries
/// a time (date-time value, fractional serial, or text with a time part).
/// An explicit time cell always wins over a time embedded in the date.
pub fn normalize_exec_instant(
    date: &CellValue,
    time: &CellValue,
) -> Result<NaiveDateTime, FieldParseError> {
    let (day, embedded) = date_part(date)?;
    let tod = match time {
        CellValue::Empty => embedded.unwrap_or(NaiveTime::MIN),
        other => time_part(other)?,
    };
    Ok(day.and_time(tod))
}

/// Execution calendar date alone; used where time of day is irrelevant.
pub fn normalize_exec_date(date: &CellValue) -> Result<NaiveDate, FieldParseError> {
    date_part(date).map(|(d, _)| d)
}

fn date_part(cell: &CellValue) -> Result<(NaiveDate, Option<NaiveTime>), FieldParseError> {
    match cell {
        CellValue::Empty => Err(FieldParseError::MissingDate),
        CellValue::Date(d) => Ok((*d, None)),
        CellValue::DateTime(dt) => Ok((dt.date(), Some(dt.time()))),
        CellValue::Number(n) => {
            let dt = serial_to_datetime(*n)
                .ok_or_else(|| FieldParseError::UnparseableDate(n.to_string()))?;
            let embedded = (n.fract() != 0.0).then(|| dt.time());
            Ok((dt.date(), embedded))
        }
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Time(t) => Err(FieldParseError::UnparseableDate(t.to_string())),
    }
}

fn time_part(cell: &CellValue) -> Result<NaiveTime, FieldParseError> {
    match cell {
        CellValue::Empty => Ok(NaiveTime::MIN),
        CellValue::Time(t) => Ok(*t),
        CellValue::DateTime(dt) => Ok(dt.time()),
        // A time cell holds a day fraction only; whole days are not a time.
        CellValue::Number(n) if (0.0..1.0).contains(n) => day_fraction_to_time(*n)
            .ok_or_else(|| FieldParseError::UnparseableTime(n.to_string())),
        CellValue::Number(n) => Err(FieldParseError::UnparseableTime(n.to_string())),
        CellValue::Text(s) => {
            parse_time_text(s).ok_or_else(|| FieldParseError::UnparseableTime(s.clone()))
        }
        CellValue::Date(d) => Err(FieldParseError::UnparseableTime(d.to_string())),
    }
}

fn parse_date_text(raw: &str) -> Result<(NaiveDate, Option<NaiveTime>), FieldParseError> {
    let s = raw.trim();
    let (date_s, time_s) = match s.split_once(char::is_whitespace) {
        Some((d, t)) => (d, Some(t.trim())),
        None => match s.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (s, None),
        },
    };

    let day = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_s, fmt).ok())
        .ok_or_else(|| FieldParseError::UnparseableDate(raw.to_string()))?;

    let embedded = match time_s.filter(|t| !t.is_empty()) {
        Some(t) => Some(
            parse_time_text(t.trim_end_matches('Z'))
                .ok_or_else(|| FieldParseError::UnparseableDate(raw.to_string()))?,
        ),
        None => None,
    };
    Ok((day, embedded))
}

fn parse_time_text(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL_DAYS {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let day = NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.trunc() as u64))?;
    Some(day.and_time(day_fraction_to_time(serial.fract())?))
}

/// Day fraction to time of day, whole seconds. Rounded to the millisecond
/// first so binary float noise does not lose a second.
fn day_fraction_to_time(frac: f64) -> Option<NaiveTime> {
    let millis = (frac * 86_400_000.0).round() as u32;
    let secs = (millis / 1000).min(86_399);
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
}
