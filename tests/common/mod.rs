#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use source_profiler::{data::RawValue, sources::RawTable};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Writes a three-column parquet file (`id`, `name`, `score`); `None`
    /// entries in the optional columns become nulls.
    pub fn write_parquet(
        &self,
        name: &str,
        rows: &[(i64, Option<&str>, Option<f64>)],
    ) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let schema = Arc::new(
            parse_message_type(
                "message people {
                    required int64 id;
                    optional binary name (UTF8);
                    optional double score;
                }",
            )
            .expect("parse parquet schema"),
        );
        let file = File::create(&path).expect("create parquet file");
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer = SerializedFileWriter::new(file, schema, props).expect("parquet writer");
        let mut row_group = writer.next_row_group().expect("row group");

        let ids = rows.iter().map(|row| row.0).collect::<Vec<_>>();
        let mut column = row_group.next_column().expect("id column").expect("id writer");
        column
            .typed::<Int64Type>()
            .write_batch(&ids, None, None)
            .expect("write ids");
        column.close().expect("close ids");

        let names = rows
            .iter()
            .filter_map(|row| row.1.map(ByteArray::from))
            .collect::<Vec<_>>();
        let name_levels = rows
            .iter()
            .map(|row| i16::from(row.1.is_some()))
            .collect::<Vec<_>>();
        let mut column = row_group
            .next_column()
            .expect("name column")
            .expect("name writer");
        column
            .typed::<ByteArrayType>()
            .write_batch(&names, Some(&name_levels), None)
            .expect("write names");
        column.close().expect("close names");

        let scores = rows.iter().filter_map(|row| row.2).collect::<Vec<_>>();
        let score_levels = rows
            .iter()
            .map(|row| i16::from(row.2.is_some()))
            .collect::<Vec<_>>();
        let mut column = row_group
            .next_column()
            .expect("score column")
            .expect("score writer");
        column
            .typed::<DoubleType>()
            .write_batch(&scores, Some(&score_levels), None)
            .expect("write scores");
        column.close().expect("close scores");

        row_group.close().expect("close row group");
        writer.close().expect("close parquet writer");
        path
    }
}

/// Single-column table of text cells; empty strings become missing values.
pub fn text_column(name: &str, cells: &[&str]) -> RawTable {
    RawTable::from_rows(
        vec![name.to_string()],
        cells.iter().map(|cell| vec![RawValue::text(*cell)]).collect(),
    )
}
