use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::ProfileConfig,
    ddl::TargetSystem,
    recommend::{Latency, WorkloadMode},
    sources::{SheetSelector, SourceFormat, SourceOptions},
};

pub use crate::io_utils::parse_delimiter;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Profile tabular sources and suggest how to store them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types, statistics and data quality for one or more files
    Profile(ProfileArgs),
    /// Render a CREATE TABLE statement for a target system
    Ddl(DdlArgs),
    /// Recommend a store, table layout, pipeline and schedule
    Recommend(RecommendArgs),
    /// Preview the first few rows of a file in a formatted table
    Preview(PreviewArgs),
}

/// Options shared by every command that reads a source.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Source format (detected from the file extension when omitted)
    #[arg(long, value_enum)]
    pub format: Option<SourceFormat>,
    /// Character encoding of text sources (sniffed when omitted or `auto`)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Delimiter for delimited text (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Zero-based row holding the column names
    #[arg(long = "header-row", default_value_t = 0)]
    pub header_row: usize,
    /// XML element that represents one row
    #[arg(long = "row-tag")]
    pub row_tag: Option<String>,
    /// Worksheet name or zero-based index for spreadsheets
    #[arg(long)]
    pub sheet: Option<SheetSelector>,
    /// Confidence threshold for type inference, in (0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,
    /// YAML file with profiling settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SourceArgs {
    /// Configuration file values with command-line overrides applied.
    pub fn profile_config(&self) -> Result<ProfileConfig> {
        let config = match &self.config {
            Some(path) => ProfileConfig::load(path)
                .with_context(|| format!("Loading configuration from {path:?}"))?,
            None => ProfileConfig::default(),
        };
        match self.threshold {
            Some(threshold) => config
                .with_threshold(threshold)
                .context("Applying --threshold"),
            None => Ok(config),
        }
    }

    pub fn source_options(&self, config: &ProfileConfig) -> SourceOptions {
        SourceOptions {
            format: self.format,
            encoding: self.input_encoding.clone(),
            delimiter: self.delimiter,
            header_row: self.header_row,
            row_tag: self.row_tag.clone(),
            sheet: self.sheet.clone().unwrap_or_default(),
            ..SourceOptions::from_config(config)
        }
    }
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// One or more input files to profile
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Emit JSON instead of a table summary
    #[arg(long)]
    pub json: bool,
    /// Write the output to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DdlArgs {
    /// Input file to derive the table from
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Target system
    #[arg(long, value_enum)]
    pub target: TargetSystem,
    /// Table name (defaults to the snake_cased file stem)
    #[arg(long)]
    pub table: Option<String>,
    /// Primary key column
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
    /// Temporal column to partition by
    #[arg(long = "partition-by")]
    pub partition_by: Option<String>,
    /// Comma-separated sort key columns
    #[arg(long = "order-by", value_delimiter = ',')]
    pub order_by: Vec<String>,
    /// Emit JSON with the statement and suggestions
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// Input file to profile
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Expected workload
    #[arg(long, value_enum)]
    pub mode: Option<WorkloadMode>,
    /// Required data freshness
    #[arg(long, value_enum)]
    pub latency: Option<Latency>,
    /// Table name (defaults to the snake_cased file stem)
    #[arg(long)]
    pub table: Option<String>,
    /// Primary key column
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
    /// Render a Markdown report instead of JSON
    #[arg(long)]
    pub report: bool,
    /// Write the output to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn source_flags_map_onto_options() {
        let cli = Cli::parse_from([
            "source-profiler",
            "preview",
            "-i",
            "people.txt",
            "--format",
            "delimited",
            "--delimiter",
            "tab",
            "--header-row",
            "2",
            "--sheet",
            "Orders",
            "--threshold",
            "0.9",
        ]);
        let Commands::Preview(args) = cli.command else {
            panic!("expected preview command");
        };
        let config = args.source.profile_config().unwrap();
        assert_eq!(config.threshold, 0.9);
        let options = args.source.source_options(&config);
        assert_eq!(options.format, Some(SourceFormat::Delimited));
        assert_eq!(options.delimiter, Some(b'\t'));
        assert_eq!(options.header_row, 2);
        assert_eq!(options.sheet, SheetSelector::Name("Orders".into()));
    }

    #[test]
    fn out_of_range_threshold_is_reported() {
        let cli = Cli::parse_from([
            "source-profiler",
            "profile",
            "-i",
            "a.csv",
            "--threshold",
            "1.5",
        ]);
        let Commands::Profile(args) = cli.command else {
            panic!("expected profile command");
        };
        assert!(args.source.profile_config().is_err());
    }

    #[test]
    fn ddl_accepts_target_and_sort_keys() {
        let cli = Cli::parse_from([
            "source-profiler",
            "ddl",
            "-i",
            "events.csv",
            "--target",
            "clickhouse",
            "--order-by",
            "id,ts",
        ]);
        let Commands::Ddl(args) = cli.command else {
            panic!("expected ddl command");
        };
        assert_eq!(args.target, TargetSystem::ClickHouse);
        assert_eq!(args.order_by, vec!["id", "ts"]);
    }
}
