use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde_json::{Map, Value as JsonValue};

use super::{Materialized, RawTable, SourceFormat, SourceOptions, SourceReader, read_text};
use crate::{
    data::RawValue,
    error::{ProfileError, ProfileResult},
};

const SCALAR_COLUMN: &str = "value";

/// JSON documents (object or array) and newline-delimited JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl SourceReader for JsonReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn read(&self, path: &Path, options: &SourceOptions) -> ProfileResult<Materialized> {
        let (text, encoding) = read_text(path, options)?;
        Ok(Materialized {
            table: parse_json_text(&text)?,
            format: self.format(),
            encoding: Some(encoding),
            delimiter: None,
        })
    }
}

pub fn parse_json_text(text: &str) -> ProfileResult<RawTable> {
    if let Some(records) = parse_json_lines(text) {
        debug!("Parsed {} JSON line(s)", records.len());
        return Ok(RawTable::from_records(records));
    }
    let document: JsonValue = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|err| ProfileError::malformed("json", err.to_string()))?;
    let records = match document {
        JsonValue::Object(object) => vec![flatten_object(object)],
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(object) => flatten_object(object),
                scalar => {
                    let mut record = IndexMap::new();
                    record.insert(SCALAR_COLUMN.to_string(), RawValue::from(scalar));
                    record
                }
            })
            .collect(),
        other => {
            return Err(ProfileError::UnsupportedFormat(format!(
                "top-level JSON {} is not tabular; expected an object or an array",
                json_kind(&other)
            )));
        }
    };
    Ok(RawTable::from_records(records))
}

/// Every non-blank line must be an object; anything else means "not NDJSON".
fn parse_json_lines(text: &str) -> Option<Vec<IndexMap<String, RawValue>>> {
    let mut records = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match serde_json::from_str::<JsonValue>(line.trim_start_matches('\u{feff}')) {
            Ok(JsonValue::Object(object)) => records.push(flatten_object(object)),
            _ => return None,
        }
    }
    (!records.is_empty()).then_some(records)
}

fn flatten_object(object: Map<String, JsonValue>) -> IndexMap<String, RawValue> {
    let mut record = IndexMap::new();
    flatten_into(&mut record, None, object);
    record
}

fn flatten_into(
    record: &mut IndexMap<String, RawValue>,
    prefix: Option<&str>,
    object: Map<String, JsonValue>,
) {
    for (key, value) in object {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            JsonValue::Object(nested) => flatten_into(record, Some(&name), nested),
            other => {
                record.insert(name, RawValue::from(other));
            }
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_of_objects_unions_sparse_keys() {
        let table = parse_json_text(r#"[{"a": 1, "b": "x"}, {"a": 2, "c": true}]"#).unwrap();
        assert_eq!(table.headers(), vec!["a", "b", "c"]);
        assert_eq!(
            table.column("c").unwrap().values,
            vec![RawValue::Missing, RawValue::Boolean(true)]
        );
    }

    #[test]
    fn newline_delimited_objects_are_rows() {
        let table = parse_json_text("{\"id\": 1}\n\n{\"id\": 2, \"v\": null}\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("v").unwrap().values[1], RawValue::Missing);
    }

    #[test]
    fn nested_objects_flatten_and_arrays_stringify() {
        let table =
            parse_json_text(r#"{"user": {"id": 7, "geo": {"lat": 1.5}}, "tags": ["a", "b"]}"#)
                .unwrap();
        assert_eq!(table.headers(), vec!["user.id", "user.geo.lat", "tags"]);
        assert_eq!(
            table.column("tags").unwrap().values[0],
            RawValue::Text(r#"["a","b"]"#.to_string())
        );
    }

    #[test]
    fn scalar_array_elements_use_value_column() {
        let table = parse_json_text("[1, {\"k\": 2}]").unwrap();
        assert_eq!(table.headers(), vec!["value", "k"]);
        assert_eq!(table.column("value").unwrap().values[0], RawValue::Integer(1));
    }

    #[test]
    fn top_level_scalar_is_unsupported() {
        assert!(matches!(
            parse_json_text("42"),
            Err(ProfileError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse_json_text("{broken"),
            Err(ProfileError::Malformed { .. })
        ));
    }
}
