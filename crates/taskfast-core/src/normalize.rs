//! Conversions between the date-only, time-only and full datetime forms
//! that flow through create and update paths.
//!
//! All clock times are interpreted in UTC. A due date is a plain calendar
//! day and is never shifted by an offset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Result, TaskfastError};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const CLOCK_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parses the calendar day of a due date.
///
/// Accepts `YYYY-MM-DD`, a naive datetime, or an RFC 3339 timestamp. For
/// offset-aware input the day is read in the input's own offset.
pub fn parse_due_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }
    if let Some(naive) = parse_naive_datetime(text) {
        return Ok(naive.date());
    }
    Err(TaskfastError::Validation(format!("invalid date '{text}'")))
}

/// Parses an absolute datetime. Naive values are taken as UTC.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(naive) = parse_naive_datetime(text) {
        return Ok(naive.and_utc());
    }
    Err(TaskfastError::Validation(format!("invalid datetime '{text}'")))
}

/// Parses a time-only value such as `9:30` or `17:45:00`.
pub fn parse_clock(text: &str) -> Result<NaiveTime> {
    let text = text.trim();
    CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| TaskfastError::Validation(format!("invalid time '{text}'")))
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn combine_utc(date: NaiveDate, clock: NaiveTime) -> DateTime<Utc> {
    date.and_time(clock).and_utc()
}

/// A start or end time as submitted by a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeInput {
    At(DateTime<Utc>),
    Clock(NaiveTime),
}

impl TimeInput {
    pub fn parse(text: &str) -> Result<Self> {
        if let Ok(clock) = parse_clock(text) {
            return Ok(TimeInput::Clock(clock));
        }
        parse_datetime(text).map(TimeInput::At)
    }
}

/// Resolves a time input to an instant, pinning clock-only values to the
/// due date.
pub fn resolve_time(input: TimeInput, due_date: Option<NaiveDate>) -> Result<DateTime<Utc>> {
    match input {
        TimeInput::At(at) => Ok(at),
        TimeInput::Clock(clock) => due_date
            .map(|date| combine_utc(date, clock))
            .ok_or_else(|| {
                TaskfastError::Validation("dueDate is required when only a time is given".into())
            }),
    }
}

/// Both ends present means start must come strictly before end.
pub fn validate_schedule(start: Option<&DateTime<Utc>>, end: Option<&DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start >= end => Err(TaskfastError::Validation(
            "startTime must be before endTime".to_string(),
        )),
        _ => Ok(()),
    }
}
