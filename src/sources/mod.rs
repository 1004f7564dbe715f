//! Source readers that materialize files into a [`RawTable`].
//!
//! One [`SourceReader`] exists per [`SourceFormat`]. Readers only shape data
//! into named columns of [`RawValue`]s; typing happens later in inference.

mod delimited;
mod excel;
mod json;
mod parquet;
mod xml;

use std::{fmt, path::Path, str::FromStr};

use clap::ValueEnum;
use encoding_rs::Encoding;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    config::ProfileConfig,
    data::RawValue,
    error::{ProfileError, ProfileResult},
    io_utils,
};

pub use delimited::{DelimitedReader, parse_delimited};
pub use excel::ExcelReader;
pub use json::{JsonReader, parse_json_text};
pub use self::parquet::ParquetReader;
pub use xml::{XmlReader, parse_xml_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Delimited,
    Json,
    Xml,
    Excel,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> ProfileResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Delimited),
            "json" | "jsonl" | "ndjson" => Ok(SourceFormat::Json),
            "xml" => Ok(SourceFormat::Xml),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Excel),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            "" => Err(ProfileError::UnsupportedFormat(format!(
                "{path:?} has no file extension; pass --format explicitly"
            ))),
            other => Err(ProfileError::UnsupportedFormat(format!(
                "unrecognized file extension '.{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Delimited => "delimited",
            SourceFormat::Json => "json",
            SourceFormat::Xml => "xml",
            SourceFormat::Excel => "excel",
            SourceFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worksheet choice for spreadsheet sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl FromStr for SheetSelector {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("sheet selector cannot be empty".to_string());
        }
        Ok(trimmed
            .parse::<usize>()
            .map(SheetSelector::Index)
            .unwrap_or_else(|_| SheetSelector::Name(trimmed.to_string())))
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Name(name) => f.write_str(name),
            SheetSelector::Index(index) => write!(f, "#{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceOptions {
    /// Overrides extension-based detection.
    pub format: Option<SourceFormat>,
    /// Encoding label; `None` or `auto` sniffs.
    pub encoding: Option<String>,
    pub delimiter: Option<u8>,
    /// Zero-based row holding column names in delimited and spreadsheet sources.
    pub header_row: usize,
    pub row_tag: Option<String>,
    pub sheet: SheetSelector,
    pub encoding_sample_bytes: usize,
    pub delimiter_sample_bytes: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self::from_config(&ProfileConfig::default())
    }
}

impl SourceOptions {
    pub fn from_config(config: &ProfileConfig) -> Self {
        Self {
            format: None,
            encoding: None,
            delimiter: None,
            header_row: 0,
            row_tag: None,
            sheet: SheetSelector::default(),
            encoding_sample_bytes: config.encoding_sample_bytes,
            delimiter_sample_bytes: config.delimiter_sample_bytes,
        }
    }

    pub fn resolve_format(&self, path: &Path) -> ProfileResult<SourceFormat> {
        match self.format {
            Some(format) => Ok(format),
            None => SourceFormat::from_path(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

/// Ordered columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    row_count: usize,
}

impl RawTable {
    /// Build from positional rows. Short rows are padded with `Missing` and
    /// long rows truncated to the header width.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        let names = unique_names(headers);
        let width = names.len();
        let row_count = rows.len();
        let mut columns = names
            .into_iter()
            .map(|name| RawColumn {
                name,
                values: Vec::with_capacity(row_count),
            })
            .collect::<Vec<_>>();
        let mut truncated = 0usize;
        for row in rows {
            if row.len() > width {
                truncated += 1;
            }
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.values.push(cells.next().unwrap_or(RawValue::Missing));
            }
        }
        if truncated > 0 {
            warn!("Truncated {truncated} row(s) wider than the {width} header column(s)");
        }
        Self { columns, row_count }
    }

    /// Build from keyed records; the column set is the union of keys in
    /// first-seen order and absent keys become `Missing`.
    pub fn from_records(records: Vec<IndexMap<String, RawValue>>) -> Self {
        let keys = records
            .iter()
            .flat_map(|record| record.keys().cloned())
            .collect::<IndexSet<_>>();
        let row_count = records.len();
        let mut columns = keys
            .iter()
            .map(|name| RawColumn {
                name: name.clone(),
                values: Vec::with_capacity(row_count),
            })
            .collect::<Vec<_>>();
        for mut record in records {
            for column in &mut columns {
                let value = record
                    .swap_remove(&column.name)
                    .unwrap_or(RawValue::Missing);
                column.values.push(value);
            }
        }
        Self { columns, row_count }
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.columns.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Vec<&RawValue>> {
        (index < self.row_count).then(|| {
            self.columns
                .iter()
                .map(|column| &column.values[index])
                .collect()
        })
    }

    /// Replace configured null tokens with `Missing`.
    pub fn apply_null_tokens(&mut self, config: &ProfileConfig) {
        if config.null_tokens.is_empty() {
            return;
        }
        for column in &mut self.columns {
            for value in &mut column.values {
                if let RawValue::Text(text) = value
                    && config.is_null_token(text.trim())
                {
                    *value = RawValue::Missing;
                }
            }
        }
    }
}

/// Blank names become `field_<n>` (1-based); repeats get `_2`, `_3`, ….
fn unique_names(headers: Vec<String>) -> Vec<String> {
    let mut seen = IndexSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, header)| {
            let trimmed = header.trim();
            let base = if trimmed.is_empty() {
                format!("field_{}", index + 1)
            } else {
                trimmed.to_string()
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while seen.contains(&name) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

/// A materialized source plus what the reader detected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub table: RawTable,
    pub format: SourceFormat,
    pub encoding: Option<&'static Encoding>,
    pub delimiter: Option<u8>,
}

pub trait SourceReader: Send + Sync {
    fn format(&self) -> SourceFormat;

    fn read(&self, path: &Path, options: &SourceOptions) -> ProfileResult<Materialized>;
}

pub fn reader_for(format: SourceFormat) -> Box<dyn SourceReader> {
    match format {
        SourceFormat::Delimited => Box::new(DelimitedReader),
        SourceFormat::Json => Box::new(JsonReader),
        SourceFormat::Xml => Box::new(XmlReader),
        SourceFormat::Excel => Box::new(ExcelReader),
        SourceFormat::Parquet => Box::new(ParquetReader),
    }
}

pub fn read_source(path: &Path, options: &SourceOptions) -> ProfileResult<Materialized> {
    if !path.exists() {
        return Err(ProfileError::NotFound(path.to_path_buf()));
    }
    let format = options.resolve_format(path)?;
    debug!("Reading {path:?} as {format}");
    reader_for(format).read(path, options)
}

/// Read and decode a text source, sniffing the encoding unless one was supplied.
pub(crate) fn read_text(
    path: &Path,
    options: &SourceOptions,
) -> ProfileResult<(String, &'static Encoding)> {
    let bytes = io_utils::read_all(path)?;
    let encoding = match io_utils::resolve_encoding(options.encoding.as_deref())? {
        Some(encoding) => encoding,
        None => {
            let sample = &bytes[..bytes.len().min(options.encoding_sample_bytes)];
            io_utils::detect_encoding(sample)
        }
    };
    debug!("Decoding {path:?} as {}", encoding.name());
    Ok((io_utils::decode_text(&bytes, encoding), encoding))
}
