//! Column type inference.
//!
//! Columns whose values arrive as native scalars are mapped by kind. Anything
//! containing text goes through an ordered cascade of parse stages; the first
//! stage that parses at least `threshold` of the sampled values claims the
//! column, and the whole column is then parsed under that stage.

use std::{fmt, str::FromStr};

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    config::{DEFAULT_INFERENCE_SAMPLE_SIZE, DEFAULT_THRESHOLD},
    data::{self, RawValue, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Text,
    Mixed,
    Null,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Integer => "integer",
            LogicalType::Float => "float",
            LogicalType::Boolean => "boolean",
            LogicalType::Timestamp => "timestamp",
            LogicalType::Date => "date",
            LogicalType::Text => "text",
            LogicalType::Mixed => "mixed",
            LogicalType::Null => "null",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "integer",
            "float",
            "boolean",
            "timestamp",
            "date",
            "text",
            "mixed",
            "null",
        ]
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, LogicalType::Integer | LogicalType::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, LogicalType::Timestamp | LogicalType::Date)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "integer" | "int" => Ok(LogicalType::Integer),
            "float" | "double" => Ok(LogicalType::Float),
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "timestamp" | "datetime" => Ok(LogicalType::Timestamp),
            "date" => Ok(LogicalType::Date),
            "text" | "string" => Ok(LogicalType::Text),
            "mixed" => Ok(LogicalType::Mixed),
            "null" => Ok(LogicalType::Null),
            _ => Err(format!(
                "Unknown logical type '{value}'. Supported types: {}",
                LogicalType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for LogicalType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        LogicalType::from_str(&token).map_err(de::Error::custom)
    }
}

pub type StageParser = fn(&str) -> Option<Value>;
pub type StageResolver = fn(Vec<Option<Value>>) -> (LogicalType, Vec<Option<Value>>);

/// One hypothesis in the cascade.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub parse: StageParser,
    pub resolve: StageResolver,
    /// Overrides the inferencer's threshold for this stage only.
    pub threshold: Option<f64>,
}

impl Stage {
    pub const fn new(name: &'static str, parse: StageParser, resolve: StageResolver) -> Self {
        Self {
            name,
            parse,
            resolve,
            threshold: None,
        }
    }

    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

pub fn default_cascade() -> Vec<Stage> {
    vec![
        Stage::new("iso-datetime", parse_iso_stage, resolve_temporal),
        Stage::new(
            "dayfirst-dotted-datetime",
            parse_dotted_stage,
            resolve_temporal,
        ),
        Stage::new(
            "permissive-datetime",
            parse_permissive_stage,
            resolve_temporal,
        ),
        Stage::new("numeric", data::parse_number, resolve_numeric),
        Stage::new("boolean", parse_boolean_stage, resolve_boolean),
    ]
}

fn parse_iso_stage(value: &str) -> Option<Value> {
    data::parse_iso_datetime(value).map(Value::Timestamp)
}

fn parse_dotted_stage(value: &str) -> Option<Value> {
    data::parse_dotted_datetime(value).map(Value::Timestamp)
}

fn parse_permissive_stage(value: &str) -> Option<Value> {
    data::parse_permissive_datetime(value).map(Value::Timestamp)
}

fn parse_boolean_stage(value: &str) -> Option<Value> {
    data::parse_boolean(value).map(Value::Boolean)
}

/// Date when every parsed value sits at midnight, otherwise Timestamp.
fn resolve_temporal(values: Vec<Option<Value>>) -> (LogicalType, Vec<Option<Value>>) {
    let all_midnight = values.iter().flatten().all(|value| match value {
        Value::Timestamp(ts) => data::is_midnight(ts),
        _ => true,
    });
    if !all_midnight {
        return (LogicalType::Timestamp, values);
    }
    let dates = values
        .into_iter()
        .map(|value| {
            value.map(|v| match v {
                Value::Timestamp(ts) => Value::Date(ts.date()),
                other => other,
            })
        })
        .collect();
    (LogicalType::Date, dates)
}

/// Integer when every value was written as an integer that fits `i64`,
/// otherwise Float. A written decimal point (`1.0`) counts as Float.
fn resolve_numeric(values: Vec<Option<Value>>) -> (LogicalType, Vec<Option<Value>>) {
    let integral = values
        .iter()
        .flatten()
        .all(|value| matches!(value, Value::Integer(_)));
    if integral {
        return (LogicalType::Integer, values);
    }
    let floats = values
        .into_iter()
        .map(|value| value.and_then(|v| v.as_f64()).map(Value::Float))
        .collect();
    (LogicalType::Float, floats)
}

fn resolve_boolean(values: Vec<Option<Value>>) -> (LogicalType, Vec<Option<Value>>) {
    (LogicalType::Boolean, values)
}

/// Result of inferring one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub logical_type: LogicalType,
    /// Parsed value per row; `None` for missing cells and cells that failed to parse.
    pub values: Vec<Option<Value>>,
    /// Name of the cascade stage that claimed the column, if one did.
    pub stage: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct TypeInferencer {
    threshold: f64,
    sample_size: usize,
    cascade: Vec<Stage>,
}

impl Default for TypeInferencer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl TypeInferencer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            sample_size: DEFAULT_INFERENCE_SAMPLE_SIZE,
            cascade: default_cascade(),
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    pub fn with_cascade(mut self, cascade: Vec<Stage>) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn infer(&self, values: &[RawValue]) -> Inference {
        let present = values.iter().filter(|v| !v.is_missing()).count();
        if present == 0 {
            return Inference {
                logical_type: LogicalType::Null,
                values: vec![None; values.len()],
                stage: None,
            };
        }
        if values.iter().all(|v| v.is_missing() || v.is_native()) {
            return self.infer_native(values, present);
        }
        self.infer_text(values)
    }

    fn infer_native(&self, values: &[RawValue], present: usize) -> Inference {
        let mut booleans = 0usize;
        let mut integers = 0usize;
        let mut floats = 0usize;
        for value in values {
            match value {
                RawValue::Boolean(_) => booleans += 1,
                RawValue::Integer(_) => integers += 1,
                RawValue::Float(_) => floats += 1,
                _ => {}
            }
        }
        let numeric = integers + floats;
        let logical_type = if booleans == present {
            LogicalType::Boolean
        } else if integers == present {
            LogicalType::Integer
        } else if numeric == present {
            LogicalType::Float
        } else if numeric as f64 / present as f64 >= self.threshold {
            if floats == 0 {
                LogicalType::Integer
            } else {
                LogicalType::Float
            }
        } else if booleans as f64 / present as f64 >= self.threshold {
            LogicalType::Boolean
        } else {
            LogicalType::Mixed
        };

        let parsed = values
            .iter()
            .map(|value| native_as(value, logical_type))
            .collect();
        Inference {
            logical_type,
            values: parsed,
            stage: None,
        }
    }

    fn infer_text(&self, values: &[RawValue]) -> Inference {
        let texts = values.iter().map(RawValue::as_text).collect::<Vec<_>>();
        let sample = texts
            .iter()
            .flatten()
            .filter(|text| !text.is_empty())
            .take(self.sample_size)
            .map(String::as_str)
            .collect::<Vec<_>>();

        for stage in &self.cascade {
            let threshold = stage.threshold.unwrap_or(self.threshold);
            let hits = sample
                .iter()
                .filter(|text| (stage.parse)(text).is_some())
                .count();
            let fraction = hits as f64 / sample.len() as f64;
            if fraction < threshold {
                continue;
            }
            debug!(
                "Stage '{}' claimed column ({hits}/{} sampled values parsed)",
                stage.name,
                sample.len()
            );
            let parsed = texts
                .iter()
                .map(|text| {
                    text.as_deref()
                        .filter(|t| !t.is_empty())
                        .and_then(stage.parse)
                })
                .collect();
            let (logical_type, values) = (stage.resolve)(parsed);
            return Inference {
                logical_type,
                values,
                stage: Some(stage.name),
            };
        }

        let parsed = texts
            .into_iter()
            .map(|text| text.filter(|t| !t.is_empty()).map(Value::Text))
            .collect();
        Inference {
            logical_type: LogicalType::Text,
            values: parsed,
            stage: None,
        }
    }
}

fn native_as(value: &RawValue, logical_type: LogicalType) -> Option<Value> {
    match (logical_type, value) {
        (LogicalType::Integer, RawValue::Integer(i)) => Some(Value::Integer(*i)),
        (LogicalType::Float, RawValue::Integer(i)) => Some(Value::Float(*i as f64)),
        (LogicalType::Float, RawValue::Float(f)) => Some(Value::Float(*f)),
        (LogicalType::Boolean, RawValue::Boolean(b)) => Some(Value::Boolean(*b)),
        (LogicalType::Mixed, RawValue::Integer(i)) => Some(Value::Integer(*i)),
        (LogicalType::Mixed, RawValue::Float(f)) => Some(Value::Float(*f)),
        (LogicalType::Mixed, RawValue::Boolean(b)) => Some(Value::Boolean(*b)),
        _ => None,
    }
}

/// Infer a column with the default cascade and sample size.
pub fn infer_column_type(values: &[RawValue], threshold: f64) -> (LogicalType, Vec<Option<Value>>) {
    let inference = TypeInferencer::new(threshold).infer(values);
    (inference.logical_type, inference.values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn texts(values: &[&str]) -> Vec<RawValue> {
        values.iter().map(|v| RawValue::text(*v)).collect()
    }

    #[test]
    fn empty_and_missing_columns_are_null() {
        assert_eq!(infer_column_type(&[], 0.8).0, LogicalType::Null);
        let (ty, parsed) = infer_column_type(&texts(&["", "  "]), 0.8);
        assert_eq!(ty, LogicalType::Null);
        assert_eq!(parsed, vec![None, None]);
    }

    #[test]
    fn blank_text_built_without_trimming_is_null() {
        let values = vec![
            RawValue::Text(String::new()),
            RawValue::Text("   ".to_string()),
        ];
        let inference = TypeInferencer::default().infer(&values);
        assert_eq!(inference.logical_type, LogicalType::Null);
        assert_eq!(inference.values, vec![None, None]);
        assert_eq!(inference.stage, None);
    }

    #[test]
    fn native_whole_floats_keep_text_columns_float() {
        let values = vec![
            RawValue::Float(1.0),
            RawValue::text("2"),
            RawValue::text("3"),
        ];
        let (ty, parsed) = infer_column_type(&values, 0.8);
        assert_eq!(ty, LogicalType::Float);
        assert_eq!(parsed[0], Some(Value::Float(1.0)));
    }

    #[test]
    fn iso_dates_resolve_to_date_when_all_midnight() {
        let (ty, parsed) = infer_column_type(&texts(&["2024-01-01", "2024-02-15", ""]), 0.8);
        assert_eq!(ty, LogicalType::Date);
        assert_eq!(
            parsed[0],
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
        );
        assert_eq!(parsed[2], None);
    }

    #[test]
    fn any_time_component_promotes_to_timestamp() {
        let (ty, _) = infer_column_type(
            &texts(&["2024-01-01 00:00:00", "2024-01-02 12:30:00"]),
            0.8,
        );
        assert_eq!(ty, LogicalType::Timestamp);
    }

    #[test]
    fn dotted_dates_are_day_first() {
        let (ty, parsed) = infer_column_type(&texts(&["01.02.2024", "15.03.2024"]), 0.8);
        assert_eq!(ty, LogicalType::Date);
        assert_eq!(
            parsed[0],
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
        );
    }

    #[test]
    fn threshold_fraction_decides_stage() {
        let mut values = texts(&["1", "2", "3", "4"]);
        values.push(RawValue::text("oops"));
        assert_eq!(infer_column_type(&values, 0.8).0, LogicalType::Integer);
        assert_eq!(infer_column_type(&values, 0.9).0, LogicalType::Text);
        let (_, parsed) = infer_column_type(&values, 0.8);
        assert_eq!(parsed[4], None);
    }

    #[test]
    fn decimal_comma_is_normalized() {
        let (ty, parsed) = infer_column_type(&texts(&["1,5", "2,25", "3"]), 0.8);
        assert_eq!(ty, LogicalType::Float);
        assert_eq!(parsed[0], Some(Value::Float(1.5)));
        assert_eq!(parsed[2], Some(Value::Float(3.0)));
    }

    #[test]
    fn written_decimal_points_stay_float() {
        let (ty, parsed) = infer_column_type(&texts(&["1.0", "2", "3.0"]), 0.8);
        assert_eq!(ty, LogicalType::Float);
        assert_eq!(parsed[1], Some(Value::Float(2.0)));
    }

    #[test]
    fn integers_beyond_i64_become_float() {
        let (ty, _) = infer_column_type(&texts(&["1", "99999999999999999999"]), 0.8);
        assert_eq!(ty, LogicalType::Float);
    }

    #[test]
    fn zero_one_columns_are_integers_not_booleans() {
        assert_eq!(
            infer_column_type(&texts(&["0", "1", "1", "0"]), 0.8).0,
            LogicalType::Integer
        );
        assert_eq!(
            infer_column_type(&texts(&["yes", "No", "Y", "n"]), 0.8).0,
            LogicalType::Boolean
        );
    }

    #[test]
    fn native_kinds_map_directly() {
        let ints = vec![RawValue::Integer(1), RawValue::Missing, RawValue::Integer(3)];
        assert_eq!(infer_column_type(&ints, 0.8).0, LogicalType::Integer);

        let numbers = vec![RawValue::Integer(1), RawValue::Float(2.5)];
        let (ty, parsed) = infer_column_type(&numbers, 0.8);
        assert_eq!(ty, LogicalType::Float);
        assert_eq!(parsed[0], Some(Value::Float(1.0)));

        let bools = vec![RawValue::Boolean(true), RawValue::Boolean(false)];
        assert_eq!(infer_column_type(&bools, 0.8).0, LogicalType::Boolean);
    }

    #[test]
    fn heterogeneous_natives_are_mixed() {
        let values = vec![
            RawValue::Boolean(true),
            RawValue::Integer(1),
            RawValue::Boolean(false),
            RawValue::Float(2.5),
        ];
        assert_eq!(infer_column_type(&values, 0.8).0, LogicalType::Mixed);
    }

    #[test]
    fn text_with_natives_runs_the_cascade() {
        let values = vec![
            RawValue::Integer(10),
            RawValue::text("20"),
            RawValue::Float(30.5),
        ];
        let (ty, parsed) = infer_column_type(&values, 0.8);
        assert_eq!(ty, LogicalType::Float);
        assert_eq!(parsed[0], Some(Value::Float(10.0)));
    }

    #[test]
    fn stage_threshold_override_applies() {
        let cascade = vec![Stage::new("numeric", data::parse_number, resolve_numeric).with_threshold(0.5)];
        let inferencer = TypeInferencer::new(0.9).with_cascade(cascade);
        let inference = inferencer.infer(&texts(&["1", "x", "3"]));
        assert_eq!(inference.logical_type, LogicalType::Integer);
        assert_eq!(inference.stage, Some("numeric"));
    }

    #[test]
    fn sample_size_limits_stage_decision() {
        let mut values = texts(&["1", "2"]);
        values.extend(texts(&["a", "b", "c", "d"]));
        let inference = TypeInferencer::new(0.8).with_sample_size(2).infer(&values);
        assert_eq!(inference.logical_type, LogicalType::Integer);
        assert_eq!(inference.values[3], None);
    }

    #[test]
    fn logical_type_round_trips_through_str() {
        for name in LogicalType::variants() {
            let parsed: LogicalType = name.parse().expect("variant parses");
            assert_eq!(parsed.as_str(), *name);
        }
        assert!("decimal".parse::<LogicalType>().is_err());
    }

    proptest! {
        #[test]
        fn integer_text_columns_always_infer_integer(
            ints in proptest::collection::vec(any::<i64>(), 1..50)
        ) {
            let raw = ints.iter().map(|i| RawValue::text(i.to_string())).collect::<Vec<_>>();
            let (ty, parsed) = infer_column_type(&raw, 0.8);
            prop_assert_eq!(ty, LogicalType::Integer);
            for (value, original) in parsed.iter().zip(&ints) {
                prop_assert_eq!(value, &Some(Value::Integer(*original)));
            }
        }
    }
}
