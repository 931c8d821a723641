// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flags shared by the analysis binaries.

use crate::config::{self, RunConfig};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

/// Directory, configuration and seed flags.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Input directory (default: `$PORTRISK_DATA_DIR`, then `.`)
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Output directory (default: `$PORTRISK_OUT_DIR`, then `.`)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
    /// JSON file overriding any analysis parameter
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Seed for column sampling and the sampler
    #[arg(long)]
    pub seed: Option<u64>,
}

impl CommonArgs {
    /// Resolved input directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        config::data_dir(self.data_dir.clone())
    }

    /// Resolved output directory.
    #[must_use]
    pub fn out_dir(&self) -> PathBuf {
        config::out_dir(self.out_dir.clone())
    }

    /// Load the run configuration and apply `--seed` to every seeded stage.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error with the file name attached.
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut cfg = RunConfig::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("loading configuration {}", path.display()),
            None => "building default configuration".to_string(),
        })?;
        if let Some(seed) = self.seed {
            cfg.fishing.seed = seed;
            cfg.transshipment.seed = seed;
            cfg.sampler.seed = seed;
        }
        Ok(cfg)
    }
}
