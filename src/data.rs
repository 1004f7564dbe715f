//! Raw and parsed cell values, plus the primitive parsers the inference
//! cascade is built from.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::LazyLock,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::{Serialize, Serializer};

/// A cell as delivered by a source reader, before inference.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl RawValue {
    /// Text cells that are empty after trimming collapse to `Missing`.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            RawValue::Missing
        } else {
            RawValue::Text(value)
        }
    }

    /// Blank text counts as missing even when built without [`RawValue::text`].
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(
            self,
            RawValue::Integer(_) | RawValue::Float(_) | RawValue::Boolean(_)
        )
    }

    /// Canonical text for the cascade; natives render the way a CSV writer would.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Float(f) => Some(format!("{f:?}")),
            RawValue::Boolean(b) => Some(b.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawValue::Missing => serde_json::Value::Null,
            RawValue::Text(s) if s.trim().is_empty() => serde_json::Value::Null,
            RawValue::Text(s) => serde_json::Value::String(s.clone()),
            RawValue::Integer(i) => serde_json::Value::from(*i),
            RawValue::Float(f) => float_to_json(*f),
            RawValue::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Missing,
            serde_json::Value::Bool(b) => RawValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Integer(i)
                } else {
                    n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Missing)
                }
            }
            serde_json::Value::String(s) => RawValue::text(s),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// A cell coerced to its column's logical type.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => float_to_json(*f),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            other => serde_json::Value::String(other.as_display()),
        }
    }

    fn float_key(value: f64) -> u64 {
        // -0.0 and 0.0 compare equal; every NaN is one distinct value.
        if value == 0.0 {
            0.0f64.to_bits()
        } else if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => Value::float_key(*a) == Value::float_key(*b),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => Value::float_key(*f).hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

pub fn float_to_json(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

static ISO_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:[.,]\d+)?)?\s?(?:Z|[+-]\d{2}(?::?\d{2})?)?)?$",
    )
    .expect("valid ISO date regex")
});

static DOTTED_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?$")
        .expect("valid dotted date regex")
});

static NUMERIC_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("valid numeric regex")
});

static INTEGER_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("valid integer regex"));

const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%dT%H:%M%:z",
];

const DOTTED_FORMATS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M", "%d.%m.%YT%H:%M:%S"];

/// Formats tried, in order, once neither explicit shape dominates a column.
const PERMISSIVE_DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
];

const PERMISSIVE_DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%Y.%m.%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

/// Parse an ISO-8601 shaped date or date-time (`YYYY-MM-DD[ T]HH:MM[:SS[.f]][offset]`).
/// Values carrying an offset are normalised to UTC.
pub fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    if !ISO_SHAPE.is_match(value) {
        return None;
    }
    if value.len() == 10 {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(at_midnight);
    }
    let normalized = value.replacen(',', ".", 1);
    if let Some(stripped) = normalized.strip_suffix('Z') {
        return parse_with_formats(stripped.trim_end(), ISO_NAIVE_FORMATS);
    }
    if let Some(parsed) = parse_with_formats(&normalized, ISO_NAIVE_FORMATS) {
        return Some(parsed);
    }
    ISO_OFFSET_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(&normalized, fmt)
            .ok()
            .map(|dt| dt.naive_utc())
    })
}

/// Parse a day-first dotted date (`DD.MM.YYYY`, optionally with a time).
pub fn parse_dotted_datetime(value: &str) -> Option<NaiveDateTime> {
    if !DOTTED_SHAPE.is_match(value) {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d.%m.%Y") {
        return Some(at_midnight(date));
    }
    parse_with_formats(value, DOTTED_FORMATS)
}

/// Mixed-format fallback: slash, dash, and month-name forms plus RFC 3339/2822.
pub fn parse_permissive_datetime(value: &str) -> Option<NaiveDateTime> {
    // Bare digit runs such as `20240101` are numbers, never dates.
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(parsed) = parse_iso_datetime(value).or_else(|| parse_dotted_datetime(value)) {
        return Some(parsed);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }
    if let Some(parsed) = parse_with_formats(value, PERMISSIVE_DATETIME_FORMATS) {
        return Some(parsed);
    }
    PERMISSIVE_DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .map(at_midnight)
    })
}

fn parse_with_formats(value: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn is_midnight(value: &NaiveDateTime) -> bool {
    value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0
}

/// Numeric parse after normalising a decimal comma to a decimal point.
///
/// Integer-shaped text parses exactly as `i64`; everything else as `f64`.
/// `inf`/`nan` spellings are rejected.
pub fn parse_number(value: &str) -> Option<Value> {
    let normalized = normalize_decimal_comma(value);
    if !NUMERIC_SHAPE.is_match(&normalized) {
        return None;
    }
    if INTEGER_SHAPE.is_match(&normalized)
        && let Ok(parsed) = normalized.parse::<i64>()
    {
        return Some(Value::Integer(parsed));
    }
    normalized
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

fn normalize_decimal_comma(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(',') && !value.contains('.') && value.matches(',').count() == 1 {
        std::borrow::Cow::Owned(value.replace(',', "."))
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}

/// Textual boolean vocabulary. Digits are deliberately absent: `0`/`1`
/// columns are integer flags.
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}
