// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fishing hours per spatial bin and risk class.
//!
//! Writes the warehouse query for the chosen risk kind. When the trip,
//! segment and position exports are in the data directory it also runs
//! the same aggregation locally and writes the binned table with areas.

use anyhow::Context;
use clap::Parser;
use portrisk::cli::CommonArgs;
use portrisk::pipeline::bins;
use portrisk::trips::RiskKind;

#[derive(Parser)]
#[command(version, about = "Compose the binning query and bin local exports")]
struct Cli {
    /// Risk assessment whose scored trips are binned (`iuu` or `la`)
    #[arg(long, default_value = "iuu")]
    kind: RiskKind,
    /// Only write the SQL, even if exports are present
    #[arg(long)]
    sql_only: bool,
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> anyhow::Result<()> {
    portrisk::logging::init();
    let cli = Cli::parse();
    let config = cli.common.run_config()?;
    let data_dir = cli.common.data_dir();
    let out_dir = cli.common.out_dir();

    let runner = if cli.sql_only {
        None
    } else {
        match bins::local_runner(&data_dir, cli.kind) {
            Ok(runner) => Some(runner),
            Err(e) => {
                tracing::info!(error = %e, "no local exports, writing the query only");
                None
            }
        }
    };

    match runner {
        Some(runner) => {
            let outputs = bins::run_with(&out_dir, cli.kind, &config, &runner)
                .with_context(|| format!("binning {} exports in {}", cli.kind, data_dir.display()))?;
            tracing::info!(outputs = outputs.len(), "binning complete");
        }
        None => {
            let query = bins::query_for(cli.kind, &config);
            bins::write_sql(&out_dir, cli.kind, &query)
                .with_context(|| format!("writing query to {}", out_dir.display()))?;
        }
    }
    Ok(())
}
