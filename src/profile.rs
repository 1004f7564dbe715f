//! Table profiling: raw table in, [`TableProfile`] out.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheKey, ProfileCache},
    config::ProfileConfig,
    error::{ProfileError, ProfileResult},
    inference::TypeInferencer,
    io_utils,
    sources::{self, RawTable, SourceOptions},
    stats::{self, ColumnProfile, DataQuality},
};

const TIME_SERIES_NAMES: &[&str] = &["ts", "created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub file_extension: Option<String>,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub sample_data: Vec<IndexMap<String, serde_json::Value>>,
    pub data_quality: DataQuality,
    pub is_time_series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceMetadata>,
}

impl TableProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn temporal_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns
            .iter()
            .filter(|column| column.logical_type.is_temporal())
    }
}

/// Profile an already materialized table.
pub fn profile_table(
    table: &RawTable,
    inferencer: &TypeInferencer,
    preview_rows: usize,
) -> TableProfile {
    let rows = table.row_count();
    let mut columns = Vec::with_capacity(table.columns().len());
    let mut parsed_columns = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let inference = inferencer.infer(&column.values);
        debug!(
            "Column '{}' inferred as {} (stage: {})",
            column.name,
            inference.logical_type,
            inference.stage.unwrap_or("native")
        );
        columns.push(stats::score_column(
            &column.name,
            inference.logical_type,
            &column.values,
            &inference.values,
        ));
        parsed_columns.push(inference.values);
    }

    let sample_data = (0..rows.min(preview_rows))
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(&parsed_columns)
                .map(|(column, parsed)| {
                    let value = match &parsed[row] {
                        Some(value) => value.to_json(),
                        None => column.values[row].to_json(),
                    };
                    (column.name.clone(), value)
                })
                .collect()
        })
        .collect();

    let data_quality = stats::score_table(&columns, rows);
    let is_time_series = looks_like_time_series(&columns);
    TableProfile {
        rows,
        columns,
        sample_data,
        data_quality,
        is_time_series,
        source: None,
    }
}

fn looks_like_time_series(columns: &[ColumnProfile]) -> bool {
    columns.iter().any(|column| {
        let name = column.name.to_ascii_lowercase();
        column.logical_type.is_temporal()
            || TIME_SERIES_NAMES.contains(&name.as_str())
            || name.contains("time")
            || name.contains("date")
    })
}

/// Profiles sources on disk, optionally through a shared cache.
#[derive(Clone)]
pub struct Profiler {
    config: ProfileConfig,
    cache: Option<Arc<dyn ProfileCache>>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(ProfileConfig::default())
    }
}

impl Profiler {
    pub fn new(config: ProfileConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ProfileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn inferencer(&self) -> TypeInferencer {
        TypeInferencer::new(self.config.threshold)
            .with_sample_size(self.config.inference_sample_size)
    }

    /// Profile an in-memory table, such as a row set fetched from a database.
    pub fn profile_table(&self, mut table: RawTable) -> TableProfile {
        table.apply_null_tokens(&self.config);
        profile_table(&table, &self.inferencer(), self.config.preview_rows)
    }

    pub fn profile_path(&self, path: &Path, options: &SourceOptions) -> ProfileResult<TableProfile> {
        let key = match &self.cache {
            Some(cache) => {
                let key = CacheKey::fingerprint(&io_utils::read_all(path)?, options, &self.config);
                if let Some(profile) = cache.get(&key) {
                    info!("Using cached profile for {path:?}");
                    return Ok(profile);
                }
                Some(key)
            }
            None => None,
        };

        let materialized = sources::read_source(path, options)?;
        info!(
            "Materialized {path:?}: {} row(s), {} column(s)",
            materialized.table.row_count(),
            materialized.table.columns().len()
        );
        let mut profile = self.profile_table(materialized.table);
        profile.source = Some(SourceMetadata {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            file_size: std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0),
            file_extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
            format: materialized.format.to_string(),
            encoding: materialized
                .encoding
                .map(|encoding| encoding.name().to_string()),
            delimiter: materialized.delimiter.map(io_utils::printable_delimiter),
        });

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.put(key, profile.clone());
        }
        Ok(profile)
    }

    /// Profile several sources concurrently. Results keep the input order and
    /// one failing source does not affect the others.
    pub fn profile_paths(
        &self,
        paths: &[PathBuf],
        options: &SourceOptions,
    ) -> Vec<(PathBuf, ProfileResult<TableProfile>)> {
        thread::scope(|scope| {
            let handles = paths
                .iter()
                .map(|path| scope.spawn(move || self.profile_path(path, options)))
                .collect::<Vec<_>>();
            paths
                .iter()
                .zip(handles)
                .map(|(path, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        warn!("Profiling thread for {path:?} panicked");
                        Err(ProfileError::malformed(
                            "source",
                            format!("profiling {path:?} panicked"),
                        ))
                    });
                    (path.clone(), result)
                })
                .collect()
        })
    }
}
