use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use log::debug;

use super::{Materialized, RawTable, SheetSelector, SourceFormat, SourceOptions, SourceReader};
use crate::{
    data::RawValue,
    error::{ProfileError, ProfileResult},
};

const EXCEL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Spreadsheet workbooks (xlsx, xlsm, xls, xlsb, ods).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelReader;

impl SourceReader for ExcelReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }

    fn read(&self, path: &Path, options: &SourceOptions) -> ProfileResult<Materialized> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|err| ProfileError::malformed("excel", err.to_string()))?;
        let sheet_names = workbook.sheet_names().to_vec();
        let sheet_name = select_sheet(&sheet_names, &options.sheet)?;
        debug!("Reading worksheet '{sheet_name}' from {path:?}");
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|err| ProfileError::malformed("excel", err.to_string()))?;

        let mut rows = range.rows().skip(options.header_row);
        let headers = rows
            .next()
            .map(|row| row.iter().map(header_text).collect())
            .unwrap_or_default();
        let rows = rows
            .map(|row| row.iter().map(cell_to_raw).collect())
            .collect();
        Ok(Materialized {
            table: RawTable::from_rows(headers, rows),
            format: self.format(),
            encoding: None,
            delimiter: None,
        })
    }
}

fn select_sheet(names: &[String], selector: &SheetSelector) -> ProfileResult<String> {
    let found = match selector {
        SheetSelector::Index(index) => names.get(*index),
        SheetSelector::Name(name) => names.iter().find(|candidate| *candidate == name),
    };
    found.cloned().ok_or_else(|| {
        ProfileError::malformed(
            "excel",
            format!(
                "worksheet {selector} not found (available: {})",
                names.join(", ")
            ),
        )
    })
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Float(value) => value.to_string(),
        other => cell_to_raw(other).as_text().unwrap_or_default(),
    }
}

fn cell_to_raw(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Missing,
        Data::Int(value) => RawValue::Integer(*value),
        Data::Float(value) => RawValue::Float(*value),
        Data::Bool(value) => RawValue::Boolean(*value),
        Data::String(value) => RawValue::text(value.as_str()),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => RawValue::Text(datetime.format(EXCEL_DATETIME_FORMAT).to_string()),
            None => RawValue::Float(value.as_f64()),
        },
        Data::DateTimeIso(value) | Data::DurationIso(value) => RawValue::text(value.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn typed_cells_stay_native() {
        assert_eq!(cell_to_raw(&Data::Int(4)), RawValue::Integer(4));
        assert_eq!(cell_to_raw(&Data::Float(1.5)), RawValue::Float(1.5));
        assert_eq!(cell_to_raw(&Data::Bool(true)), RawValue::Boolean(true));
        assert_eq!(
            cell_to_raw(&Data::String(" ".to_string())),
            RawValue::Missing
        );
        assert_eq!(
            cell_to_raw(&Data::Error(CellErrorType::Div0)),
            RawValue::Missing
        );
        assert_eq!(
            cell_to_raw(&Data::DateTimeIso("2024-01-01T10:00:00".to_string())),
            RawValue::text("2024-01-01T10:00:00")
        );
    }

    #[test]
    fn sheet_selection_by_name_and_index() {
        let names = vec!["Summary".to_string(), "Data".to_string()];
        assert_eq!(
            select_sheet(&names, &SheetSelector::Index(1)).unwrap(),
            "Data"
        );
        assert_eq!(
            select_sheet(&names, &SheetSelector::Name("Summary".into())).unwrap(),
            "Summary"
        );
        assert!(select_sheet(&names, &SheetSelector::Index(5)).is_err());
    }

    #[test]
    fn header_cells_render_as_text() {
        assert_eq!(header_text(&Data::Int(2024)), "2024");
        assert_eq!(header_text(&Data::Float(2024.0)), "2024");
        assert_eq!(header_text(&Data::Empty), "");
    }
}
