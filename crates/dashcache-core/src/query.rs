//! Range-query descriptors parsed from `/api/v1/query_range` request URIs.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::range::TimeRange;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// One logical range query: expression, whole-second bounds and step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    pub query: String,
    pub start: i64,
    pub end: i64,
    pub step: Duration,
}

impl QueryDescriptor {
    pub fn new(query: impl Into<String>, start: i64, end: i64, step: Duration) -> Self {
        Self {
            query: query.into(),
            start,
            end,
            step,
        }
    }

    /// Parse a request URI (absolute, or an absolute path with a query
    /// component) into a descriptor.
    ///
    /// Missing parameters keep their zero value. `start` and `end` accept
    /// fractional seconds and are truncated; a `step` with no unit suffix is
    /// read as nanoseconds.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = parse_request_uri(uri)?;

        let mut query = None;
        let mut start = None;
        let mut end = None;
        let mut step = None;
        // First occurrence wins.
        for (name, value) in url.query_pairs() {
            let slot = match name.as_ref() {
                "query" => &mut query,
                "start" => &mut start,
                "end" => &mut end,
                "step" => &mut step,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let mut desc = Self::new(query.unwrap_or_default(), 0, 0, Duration::ZERO);
        if let Some(raw) = start.filter(|s| !s.is_empty()) {
            desc.start = parse_seconds("start", &raw)?;
        }
        if let Some(raw) = end.filter(|s| !s.is_empty()) {
            desc.end = parse_seconds("end", &raw)?;
        }
        if let Some(raw) = step.filter(|s| !s.is_empty()) {
            desc.step = parse_step(&raw)?;
        }
        Ok(desc)
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Same query and step over a different window.
    pub fn with_range(&self, range: TimeRange) -> Self {
        Self {
            query: self.query.clone(),
            start: range.start,
            end: range.end,
            step: self.step,
        }
    }

    /// Step in nanoseconds, the unit the range store keys on.
    pub fn step_nanos(&self) -> Result<i64> {
        i64::try_from(self.step.as_nanos())
            .map_err(|_| Error::MalformedQuery(format!("step {:?} out of range", self.step)))
    }

    /// Informational cache key.
    ///
    /// Both time fields are the start truncated to the minute; the end is
    /// never consulted. Existing keys were produced this way, so it is kept.
    pub fn key(&self) -> String {
        let minute = self.start / 60 * 60;
        format!("{}-{}-{}-{}", self.query, minute, minute, format_step(self.step))
    }
}

fn parse_request_uri(uri: &str) -> Result<Url> {
    if uri.starts_with('/') {
        let base = Url::parse("http://localhost/")
            .map_err(|e| Error::Internal(e.to_string()))?;
        base.join(uri)
            .map_err(|e| Error::MalformedQuery(format!("invalid URI {:?}: {}", uri, e)))
    } else {
        Url::parse(uri).map_err(|e| Error::MalformedQuery(format!("invalid URI {:?}: {}", uri, e)))
    }
}

fn parse_seconds(field: &str, raw: &str) -> Result<i64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| Error::MalformedQuery(format!("invalid {}: {:?}", field, raw)))?;
    if !value.is_finite() {
        return Err(Error::MalformedQuery(format!("invalid {}: {:?}", field, raw)));
    }
    Ok(value.trunc() as i64)
}

/// Parse a step duration such as `15s`, `1m30s`, `1.5h` or `250ms`.
/// A bare number is taken as nanoseconds.
pub fn parse_step(raw: &str) -> Result<Duration> {
    let malformed = || Error::MalformedQuery(format!("invalid step: {:?}", raw));

    let bare = raw.as_bytes().last().is_some_and(|b| b.is_ascii_digit());
    let text = if bare { format!("{}ns", raw) } else { raw.to_string() };
    // No '-' sign: a negative step is never a valid range-query step.
    let mut rest = text.strip_prefix('+').unwrap_or(text.as_str());
    if rest.is_empty() {
        return Err(malformed());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, tail) = rest.split_at(int_len);
        rest = tail;

        let mut frac_part = "";
        if let Some(tail) = rest.strip_prefix('.') {
            let frac_len = tail.bytes().take_while(u8::is_ascii_digit).count();
            let (digits, tail) = tail.split_at(frac_len);
            frac_part = digits;
            rest = tail;
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, tail) = rest.split_at(unit_len);
        rest = tail;
        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            _ => return Err(malformed()),
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| malformed())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(malformed)?;

        let mut numerator: u128 = 0;
        let mut denominator: u128 = 1;
        for digit in frac_part.bytes() {
            // Digits past nanosecond precision cannot change the result.
            if denominator >= 10u128.pow(18) {
                break;
            }
            numerator = numerator * 10 + u128::from(digit - b'0');
            denominator *= 10;
        }
        nanos += numerator * scale / denominator;

        total = total.checked_add(nanos).ok_or_else(malformed)?;
        if total > i64::MAX as u128 {
            return Err(malformed());
        }
    }

    Ok(Duration::from_nanos(total as u64))
}

/// Render a step the way duration strings print: `15s`, `1m0s`, `1h30m0s`,
/// `250ms`, `1.5µs`.
pub fn format_step(step: Duration) -> String {
    let nanos = step.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{}ns", nanos);
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}µs", decimal(nanos, NANOS_PER_MICRO, 3));
    }
    if nanos < NANOS_PER_SECOND {
        return format!("{}ms", decimal(nanos, NANOS_PER_MILLI, 6));
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = nanos % NANOS_PER_HOUR / NANOS_PER_MINUTE;
    let seconds = decimal(nanos % NANOS_PER_MINUTE, NANOS_PER_SECOND, 9);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn decimal(value: u128, unit: u128, width: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
