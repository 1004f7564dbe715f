use anyhow::{Context, Result};
use log::info;

use crate::{cli::PreviewArgs, config::ProfileConfig, sources, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let config = args.source.profile_config()?;
    print!("{}", render(args, &config)?);
    Ok(())
}

fn render(args: &PreviewArgs, config: &ProfileConfig) -> Result<String> {
    let options = args.source.source_options(config);
    let mut materialized = sources::read_source(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    materialized.table.apply_null_tokens(config);
    let shown = materialized.table.row_count().min(args.rows);
    info!(
        "Displaying {shown} of {} row(s) from {:?}",
        materialized.table.row_count(),
        args.input
    );
    Ok(table::render_preview(&materialized.table, args.rows))
}
