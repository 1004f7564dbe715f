use std::{fs::File, path::Path};

use chrono::{DateTime, NaiveDate};
use log::debug;
use parquet::{
    file::reader::{FileReader, SerializedFileReader},
    record::Field,
};

use super::{Materialized, RawTable, SourceFormat, SourceOptions, SourceReader};
use crate::{
    data::RawValue,
    error::{ProfileError, ProfileResult},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parquet files read through the row-oriented record API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetReader;

impl SourceReader for ParquetReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Parquet
    }

    fn read(&self, path: &Path, _options: &SourceOptions) -> ProfileResult<Materialized> {
        let file = File::open(path).map_err(|err| ProfileError::io(path, err))?;
        let reader = SerializedFileReader::new(file)
            .map_err(|err| ProfileError::malformed("parquet", err.to_string()))?;
        let headers = reader
            .metadata()
            .file_metadata()
            .schema()
            .get_fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect::<Vec<_>>();
        debug!(
            "Parquet file {path:?} has {} column(s) across {} row group(s)",
            headers.len(),
            reader.metadata().num_row_groups()
        );

        let mut rows = Vec::new();
        let iter = reader
            .get_row_iter(None)
            .map_err(|err| ProfileError::malformed("parquet", err.to_string()))?;
        for row in iter {
            let row = row.map_err(|err| ProfileError::malformed("parquet", err.to_string()))?;
            rows.push(
                row.get_column_iter()
                    .map(|(_, field)| field_to_raw(field))
                    .collect::<Vec<_>>(),
            );
        }
        Ok(Materialized {
            table: RawTable::from_rows(headers, rows),
            format: self.format(),
            encoding: None,
            delimiter: None,
        })
    }
}

fn field_to_raw(field: &Field) -> RawValue {
    match field {
        Field::Null => RawValue::Missing,
        Field::Bool(value) => RawValue::Boolean(*value),
        Field::Byte(value) => RawValue::Integer(i64::from(*value)),
        Field::Short(value) => RawValue::Integer(i64::from(*value)),
        Field::Int(value) => RawValue::Integer(i64::from(*value)),
        Field::Long(value) => RawValue::Integer(*value),
        Field::UByte(value) => RawValue::Integer(i64::from(*value)),
        Field::UShort(value) => RawValue::Integer(i64::from(*value)),
        Field::UInt(value) => RawValue::Integer(i64::from(*value)),
        Field::ULong(value) => i64::try_from(*value)
            .map(RawValue::Integer)
            .unwrap_or(RawValue::Float(*value as f64)),
        Field::Float(value) => RawValue::Float(f64::from(*value)),
        Field::Double(value) => RawValue::Float(*value),
        Field::Str(value) => RawValue::text(value.as_str()),
        Field::Date(days) => render_date(*days),
        Field::TimestampMillis(millis) => DateTime::from_timestamp_millis(*millis)
            .map(|ts| RawValue::Text(ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()))
            .unwrap_or(RawValue::Integer(*millis)),
        Field::TimestampMicros(micros) => DateTime::from_timestamp_micros(*micros)
            .map(|ts| RawValue::Text(ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()))
            .unwrap_or(RawValue::Integer(*micros)),
        other => RawValue::text(other.to_string()),
    }
}

fn render_date(days: i32) -> RawValue {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(days))))
        .map(|date| RawValue::Text(date.format("%Y-%m-%d").to_string()))
        .unwrap_or(RawValue::Integer(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_fields_map_to_native_values() {
        assert_eq!(field_to_raw(&Field::Null), RawValue::Missing);
        assert_eq!(field_to_raw(&Field::Int(3)), RawValue::Integer(3));
        assert_eq!(field_to_raw(&Field::Double(0.5)), RawValue::Float(0.5));
        assert_eq!(
            field_to_raw(&Field::Str("abc".to_string())),
            RawValue::text("abc")
        );
        assert_eq!(
            field_to_raw(&Field::ULong(u64::MAX)),
            RawValue::Float(u64::MAX as f64)
        );
    }

    #[test]
    fn temporal_fields_render_as_text() {
        assert_eq!(
            field_to_raw(&Field::Date(19_723)),
            RawValue::text("2024-01-01")
        );
        assert_eq!(
            field_to_raw(&Field::TimestampMillis(1_704_110_400_000)),
            RawValue::text("2024-01-01 12:00:00")
        );
    }
}
