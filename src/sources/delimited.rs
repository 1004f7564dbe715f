use std::path::Path;

use log::{debug, warn};

use super::{Materialized, RawTable, SourceFormat, SourceOptions, SourceReader, read_text};
use crate::{
    data::RawValue,
    error::ProfileResult,
    io_utils,
};

/// CSV, TSV, and other single-character delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedReader;

impl SourceReader for DelimitedReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Delimited
    }

    fn read(&self, path: &Path, options: &SourceOptions) -> ProfileResult<Materialized> {
        let (text, encoding) = read_text(path, options)?;
        let delimiter = match options.delimiter {
            Some(delimiter) => delimiter,
            None => io_utils::detect_delimiter(io_utils::text_prefix(
                &text,
                options.delimiter_sample_bytes,
            )),
        };
        debug!(
            "Parsing {path:?} with delimiter '{}'",
            io_utils::printable_delimiter(delimiter)
        );
        let table = parse_delimited(&text, delimiter, options.header_row);
        Ok(Materialized {
            table,
            format: self.format(),
            encoding: Some(encoding),
            delimiter: Some(delimiter),
        })
    }
}

/// Parse decoded delimited text. Records before `header_row` are skipped and
/// unreadable records are dropped with a warning.
pub fn parse_delimited(text: &str, delimiter: u8, header_row: usize) -> RawTable {
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                skipped += 1;
                debug!("Skipping unreadable record {}: {err}", index + 1);
                continue;
            }
        };
        if index < header_row {
            continue;
        }
        match headers {
            None => headers = Some(record.iter().map(str::to_string).collect()),
            Some(_) => rows.push(record.iter().map(RawValue::text).collect::<Vec<_>>()),
        }
    }

    if skipped > 0 {
        warn!("Skipped {skipped} unreadable record(s)");
    }
    RawTable::from_rows(headers.unwrap_or_default(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_index_skips_preamble() {
        let text = "exported by tool\nid,name\n1,Ann\n2,Bo\n";
        let table = parse_delimited(text, b',', 1);
        assert_eq!(table.headers(), vec!["id", "name"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn quoted_fields_and_blank_cells() {
        let text = "a;b\n\"x;y\";\n";
        let table = parse_delimited(text, b';', 0);
        assert_eq!(table.columns()[0].values, vec![RawValue::text("x;y")]);
        assert_eq!(table.columns()[1].values, vec![RawValue::Missing]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let table = parse_delimited("a,b,c\n1\n1,2,3,4\n", b',', 0);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[2].values[0], RawValue::Missing);
        assert_eq!(table.columns()[2].values[1], RawValue::text("3"));
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = parse_delimited("", b',', 0);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }
}
