// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transshipment risk model over encounters and loitering events.

use anyhow::Context;
use clap::Parser;
use portrisk::cli::CommonArgs;
use portrisk::pipeline::transshipment;
use portrisk::trips::RiskKind;

#[derive(Parser)]
#[command(version, about = "Score transshipment trips and attribute the model to feature pairs")]
struct Cli {
    /// Risk assessment to model (`iuu` or `la`)
    #[arg(long, default_value = "iuu")]
    kind: RiskKind,
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> anyhow::Result<()> {
    portrisk::logging::init();
    let cli = Cli::parse();
    let config = cli.common.run_config()?;
    let data_dir = cli.common.data_dir();
    let out_dir = cli.common.out_dir();

    let report = transshipment::run(&data_dir, &out_dir, cli.kind, &config)
        .with_context(|| format!("transshipment {} analysis over {}", cli.kind, data_dir.display()))?;
    tracing::info!(
        observed = report.observed,
        predicted = report.predicted,
        events = report.events,
        "transshipment analysis complete"
    );
    Ok(())
}
