// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical before/after model of foreign-vessel port visits.
//!
//! The positional argument selects the visits: a vessel class
//! (`trawlers`, `cargo`, ...), `fishing_gear`, or a flag group
//! (`group1`, `china`, ...). An unknown value exits before any data is
//! read.

use anyhow::Context;
use clap::Parser;
use portrisk::cli::CommonArgs;
use portrisk::pipeline::psma;
use portrisk::psma::AnalysisVariable;

#[derive(Parser)]
#[command(version, about = "Fit the PSMA port-visit model for one vessel subset")]
struct Cli {
    /// Vessel class, `fishing_gear`, or flag group
    variable: AnalysisVariable,
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> anyhow::Result<()> {
    portrisk::logging::init();
    let cli = Cli::parse();
    let config = cli.common.run_config()?;
    let data_dir = cli.common.data_dir();
    let out_dir = cli.common.out_dir();

    let report = psma::run(&data_dir, &out_dir, &cli.variable, &config)
        .with_context(|| format!("PSMA model for '{}' over {}", cli.variable, data_dir.display()))?;
    tracing::info!(
        ports = report.ports,
        cells = report.cells,
        max_r_hat = report.max_r_hat,
        divergences = report.divergences,
        "PSMA analysis complete"
    );
    Ok(())
}
