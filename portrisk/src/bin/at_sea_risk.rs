// SPDX-License-Identifier: AGPL-3.0-or-later
//! At-sea fishing-trip risk model with SHAP-interaction attribution.
//!
//! ```text
//! at_sea_risk --kind la --data-dir data/ --out-dir out/
//! ```

use anyhow::Context;
use clap::Parser;
use portrisk::cli::CommonArgs;
use portrisk::pipeline::at_sea;
use portrisk::trips::RiskKind;

#[derive(Parser)]
#[command(version, about = "Score fishing trips and attribute the model to feature pairs")]
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

    let report = at_sea::run(&data_dir, &out_dir, cli.kind, &config)
        .with_context(|| format!("at-sea {} analysis over {}", cli.kind, data_dir.display()))?;
    tracing::info!(
        observed = report.observed,
        predicted = report.predicted,
        outputs = report.outputs.len(),
        "at-sea analysis complete"
    );
    Ok(())
}
