//! Conversions between [`CdrRecord`] and its transport and log representations.

use chrono::{Local, TimeZone};

use crate::error::CdrResult;
use crate::types::CdrRecord;

/// Layout of timestamps in log lines, millisecond precision without offset.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Number of leading fields holding epoch-millisecond timestamps.
const TIMESTAMP_FIELDS: usize = 3;

/// Decodes a record from its JSON transport form.
pub fn decode(raw: &str) -> CdrResult<CdrRecord> {
    Ok(serde_json::from_str(raw)?)
}

/// Encodes a record into its JSON transport form.
pub fn encode(record: &CdrRecord) -> CdrResult<String> {
    Ok(serde_json::to_string(record)?)
}

/// Builds the delimited log line for `record`.
///
/// `record_date`, `submit_date` and `delivery_date` are rendered in the local time
/// zone; every other field is copied verbatim in declared order.
pub fn to_line(record: &CdrRecord, separator: &str) -> String {
    to_line_in(record, separator, &Local)
}

/// Same as [`to_line`] with an explicit time zone for the timestamp fields.
pub fn to_line_in<Tz>(record: &CdrRecord, separator: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut parts: Vec<String> = Vec::with_capacity(CdrRecord::FIELD_COUNT);
    for (index, value) in record.fields().into_iter().enumerate() {
        if index < TIMESTAMP_FIELDS {
            parts.push(format_timestamp_in(value, tz));
        } else {
            parts.push(value.to_string());
        }
    }

    parts.join(separator)
}

/// Formats epoch milliseconds, or returns `""` when `millis` is not a valid timestamp.
fn format_timestamp_in<Tz>(millis: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Ok(millis) = millis.trim().parse::<i64>() else {
        return String::new();
    };

    match tz.timestamp_millis_opt(millis).single() {
        Some(datetime) => datetime.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}
