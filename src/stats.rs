use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    data::{RawValue, Value},
    inference::LogicalType,
};

pub const NO_DATA_ISSUE: &str = "no data to analyze";
const MOSTLY_EMPTY_PERCENT: f64 = 50.0;
const ISSUE_PENALTY: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "dtype")]
    pub logical_type: LogicalType,
    pub nullable: bool,
    pub example: serde_json::Value,
    #[serde(rename = "unique_count")]
    pub distinct_count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness_score: f64,
    pub consistency_score: f64,
    pub uniqueness_score: f64,
    pub issues: Vec<String>,
}

impl DataQuality {
    fn empty() -> Self {
        Self {
            completeness_score: 0.0,
            consistency_score: 0.0,
            uniqueness_score: 0.0,
            issues: vec![NO_DATA_ISSUE.to_string()],
        }
    }
}

/// Collects finite numeric observations for one column.
#[derive(Debug, Default)]
struct NumericAccumulator {
    values: Vec<f64>,
}

impl NumericAccumulator {
    fn add_value(&mut self, value: &Value) {
        if let Some(number) = value.as_f64().filter(|n| n.is_finite()) {
            self.values.push(number);
        }
    }

    fn finish(mut self) -> Option<NumericStats> {
        if self.values.is_empty() {
            return None;
        }
        self.values.sort_by(|a, b| a.total_cmp(b));
        let sum: f64 = self.values.iter().sum();
        let mean = sum / self.values.len() as f64;
        Some(NumericStats {
            min: self.values.first().copied().filter(|v| v.is_finite()),
            max: self.values.last().copied().filter(|v| v.is_finite()),
            mean: Some(mean).filter(|v| v.is_finite()),
            p25: percentile(&self.values, 0.25),
            p50: percentile(&self.values, 0.50),
            p75: percentile(&self.values, 0.75),
        })
    }
}

/// Linear interpolation between closest ranks over an ascending slice.
pub fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    let value = sorted[lower] + (sorted[upper] - sorted[lower]) * weight;
    value.is_finite().then_some(value)
}

pub fn score_column(
    name: &str,
    logical_type: LogicalType,
    raw: &[RawValue],
    parsed: &[Option<Value>],
) -> ColumnProfile {
    let rows = parsed.len();
    let null_count = parsed.iter().filter(|value| value.is_none()).count();
    let distinct_count = parsed.iter().flatten().collect::<HashSet<_>>().len();
    let null_percentage = if rows == 0 {
        0.0
    } else {
        null_count as f64 / rows as f64 * 100.0
    };

    let example = raw
        .iter()
        .zip(parsed)
        .find(|(raw, _)| !raw.is_missing())
        .map(|(raw, parsed)| match parsed {
            Some(value) => value.to_json(),
            None => raw.to_json(),
        })
        .unwrap_or(serde_json::Value::Null);

    let numeric_stats = if logical_type.is_numeric() {
        let mut accumulator = NumericAccumulator::default();
        parsed
            .iter()
            .flatten()
            .for_each(|value| accumulator.add_value(value));
        accumulator.finish()
    } else {
        None
    };

    ColumnProfile {
        name: name.to_string(),
        logical_type,
        nullable: null_count > 0,
        example,
        distinct_count,
        null_count,
        null_percentage,
        numeric_stats,
    }
}

pub fn score_table(columns: &[ColumnProfile], row_count: usize) -> DataQuality {
    if row_count == 0 || columns.is_empty() {
        return DataQuality::empty();
    }
    let column_count = columns.len() as f64;
    let mean_null = columns.iter().map(|c| c.null_percentage).sum::<f64>() / column_count;
    let completeness_score = (100.0 - mean_null).max(0.0);
    let uniqueness_score = columns
        .iter()
        .map(|c| (c.distinct_count as f64 / row_count as f64 * 100.0).min(100.0))
        .sum::<f64>()
        / column_count;

    let mut issues = Vec::new();
    for column in columns {
        if column.null_percentage > MOSTLY_EMPTY_PERCENT {
            issues.push(format!(
                "column '{}' contains mostly empty values ({:.1}% missing)",
                column.name, column.null_percentage
            ));
        }
        if column.distinct_count == row_count && row_count > 1 {
            issues.push(format!(
                "column '{}' is fully unique (possibly an identifier)",
                column.name
            ));
        }
    }
    let consistency_score = (100.0 - ISSUE_PENALTY * issues.len() as f64).max(0.0);

    DataQuality {
        completeness_score,
        consistency_score,
        uniqueness_score,
        issues,
    }
}
