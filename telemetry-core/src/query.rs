//! Turns a user-authored YAML query document into the JSON wire query.
//!
//! The document is decoded into a generic value tree, the reserved keys are
//! injected or removed, and the tree is re-encoded. No text substitution
//! happens here; anything the document says outside the reserved keys is sent
//! as decoded.

use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde_json::{Map, Value};

use crate::error::{DocumentError, OffsetError, PrepareError};
use crate::granularity::{default_granularity, format_granularity};

pub const OFFSET_KEY: &str = "@offset";
pub const FROM_KEY: &str = "from";
pub const TO_KEY: &str = "to";
pub const GRANULARITY_KEY: &str = "granularity";
pub const AGGREGATION_KEY: &str = "aggregation";
pub const DEFAULT_AGGREGATION: &str = "auto";

/// Requested time window, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    fn shift_back(&self, offset: TimeDelta) -> Option<TimeRange> {
        Some(TimeRange {
            from: self.from.checked_sub_signed(offset)?,
            to: self.to.checked_sub_signed(offset)?,
        })
    }
}

/// Wire query plus the offset that was applied to its window.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub text: String,
    /// Zero when the document has no `@offset`. The decoded series must be
    /// shifted forward by this amount before display.
    pub offset: TimeDelta,
}

/// Prepares one sub-query.
///
/// `from` and `to` always come from `range` (moved back by `@offset` when
/// present). `granularity` and `aggregation` are only filled in when the
/// document leaves them out.
pub fn prepare(
    text: &str,
    interval: Duration,
    range: TimeRange,
) -> Result<PreparedQuery, PrepareError> {
    let mut document = decode_document(text)?;

    let offset = match document.remove(OFFSET_KEY) {
        Some(value) => parse_offset(&value)?,
        None => TimeDelta::zero(),
    };
    let range = range
        .shift_back(offset)
        .ok_or(PrepareError::WindowOutOfRange)?;

    document.insert(FROM_KEY.to_string(), Value::String(format_timestamp(&range.from)));
    document.insert(TO_KEY.to_string(), Value::String(format_timestamp(&range.to)));
    document
        .entry(GRANULARITY_KEY)
        .or_insert_with(|| Value::String(format_granularity(default_granularity(interval))));
    document
        .entry(AGGREGATION_KEY)
        .or_insert_with(|| Value::String(DEFAULT_AGGREGATION.to_string()));

    Ok(PreparedQuery {
        text: serde_json::to_string(&document)?,
        offset,
    })
}

fn decode_document(text: &str) -> Result<Map<String, Value>, DocumentError> {
    match serde_yaml::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(DocumentError::NotAMapping(kind(&other))),
    }
}

/// Parses an `@offset` value such as `"2s"`, `"1h 30m"` or `"-15m"`.
pub fn parse_offset(value: &Value) -> Result<TimeDelta, OffsetError> {
    let text = match value {
        Value::String(text) => text.trim(),
        other => return Err(OffsetError::UnexpectedType(kind(other))),
    };

    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let duration = humantime::parse_duration(magnitude)?;
    let delta =
        TimeDelta::from_std(duration).map_err(|_| OffsetError::OutOfRange(text.to_string()))?;

    Ok(if negative { -delta } else { delta })
}

/// RFC 3339 in UTC with up to nine fractional digits, trailing zeros
/// trimmed.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    let mut out = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = t.nanosecond() % 1_000_000_000;
    if nanos != 0 {
        let digits = format!("{:09}", nanos);
        let _ = write!(out, ".{}", digits.trim_end_matches('0'));
    }
    out.push('Z');
    out
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
