pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod ddl;
pub mod error;
pub mod inference;
pub mod io_utils;
pub mod preview;
pub mod profile;
pub mod recommend;
pub mod sources;
pub mod stats;
pub mod table;

use std::{
    env, fs,
    path::Path,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{LevelFilter, debug, error, info};

use crate::{
    cache::MemoryCache,
    cli::{Cli, Commands},
    ddl::DdlHints,
    profile::{Profiler, TableProfile},
    recommend::{Preferences, Recommender},
};

pub use crate::{
    error::{ProfileError, ProfileResult},
    inference::{LogicalType, TypeInferencer, infer_column_type},
    profile::profile_table,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("source_profiler", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Profile(args) => handle_profile(&args),
        Commands::Ddl(args) => handle_ddl(&args),
        Commands::Recommend(args) => handle_recommend(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}

fn handle_profile(args: &cli::ProfileArgs) -> Result<()> {
    let config = args.source.profile_config()?;
    let options = args.source.source_options(&config);
    let profiler = Profiler::new(config).with_cache(Arc::new(MemoryCache::default()));
    info!("Profiling {} source(s)", args.inputs.len());

    let mut profiles: IndexMap<String, TableProfile> = IndexMap::new();
    let mut failures = 0usize;
    for (path, result) in profiler.profile_paths(&args.inputs, &options) {
        match result {
            Ok(profile) => {
                info!(
                    "Profiled {path:?}: {} row(s), {} column(s)",
                    profile.rows,
                    profile.columns.len()
                );
                profiles.insert(path.display().to_string(), profile);
            }
            Err(err) => {
                error!("Failed to profile {path:?}: {err}");
                failures += 1;
            }
        }
    }

    let rendered = if args.json {
        if args.inputs.len() == 1 {
            match profiles.values().next() {
                Some(profile) => serde_json::to_string_pretty(profile)?,
                None => String::new(),
            }
        } else {
            serde_json::to_string_pretty(&profiles)?
        }
    } else {
        profiles
            .iter()
            .map(|(path, profile)| {
                if profiles.len() > 1 {
                    format!("== {path} ==\n{}", table::render_profile(profile))
                } else {
                    table::render_profile(profile)
                }
            })
            .join("\n")
    };
    if !rendered.is_empty() {
        emit(args.output.as_deref(), &rendered)?;
    }

    if failures > 0 {
        bail!(
            "{failures} of {} source(s) could not be profiled",
            args.inputs.len()
        );
    }
    Ok(())
}

fn profile_single(input: &Path, source: &cli::SourceArgs) -> Result<TableProfile> {
    let config = source.profile_config()?;
    let options = source.source_options(&config);
    Profiler::new(config)
        .profile_path(input, &options)
        .with_context(|| format!("Profiling {input:?}"))
}

fn handle_ddl(args: &cli::DdlArgs) -> Result<()> {
    let profile = profile_single(&args.input, &args.source)?;
    let table_name = args
        .table
        .clone()
        .unwrap_or_else(|| ddl::table_name_for(&args.input));
    let hints = DdlHints {
        primary_key: args.primary_key.clone(),
        partition_by: args.partition_by.clone(),
        order_by: args
            .order_by
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect(),
    };
    debug!("DDL hints: {hints:?}");
    let output = ddl::generate_ddl(&table_name, &profile.columns, args.target, &hints);
    info!(
        "Rendered {} DDL for {} column(s) as '{table_name}'",
        args.target,
        profile.columns.len()
    );

    if args.json {
        emit(None, &serde_json::to_string_pretty(&output)?)
    } else {
        let mut rendered = output.ddl_sql.clone();
        if !output.suggestions.is_empty() {
            rendered.push('\n');
            for suggestion in &output.suggestions {
                rendered.push_str(&format!("\n-- {suggestion}"));
            }
        }
        emit(None, &rendered)
    }
}

fn handle_recommend(args: &cli::RecommendArgs) -> Result<()> {
    let profile = profile_single(&args.input, &args.source)?;
    let prefs = Preferences {
        mode: args.mode,
        latency: args.latency,
        table_name: Some(
            args.table
                .clone()
                .unwrap_or_else(|| ddl::table_name_for(&args.input)),
        ),
        primary_key: args.primary_key.clone(),
    };
    let recommendation = Recommender::new().recommend(&profile, &prefs);
    info!(
        "Recommended {} ({} origin) for {:?}",
        recommendation.target_store, recommendation.origin, args.input
    );

    let rendered = if args.report {
        recommend::render_report(&recommendation, Some(&profile))
    } else {
        serde_json::to_string_pretty(&recommendation)?
    };
    emit(args.output.as_deref(), &rendered)
}

fn emit(output: Option<&Path>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, ensure_trailing_newline(contents))
                .with_context(|| format!("Writing output to {path:?}"))?;
            info!("Output written to {path:?}");
        }
        None => print!("{}", ensure_trailing_newline(contents)),
    }
    Ok(())
}

fn ensure_trailing_newline(contents: &str) -> String {
    if contents.ends_with('\n') {
        contents.to_string()
    } else {
        format!("{contents}\n")
    }
}
