// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run configuration.
//!
//! Every analysis constant has a typed default; a JSON file may override
//! any subset of them:
//!
//! ```json
//! { "sampler": { "draws": 1000, "tune": 500 }, "retention": { "fraction": 0.97 } }
//! ```
//!
//! Directories resolve from the command line, then [`DATA_DIR_ENV`] /
//! [`OUT_DIR_ENV`], then the current directory.

use crate::bayes::SamplerConfig;
use crate::error::{Error, Result};
use crate::model::BoostParams;
use crate::psma::{PartyAdjustments, RetentionConfig};
use crate::spatial::BinQuery;
use crate::trips::RiskThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input directory override.
pub const DATA_DIR_ENV: &str = "PORTRISK_DATA_DIR";
/// Output directory override.
pub const OUT_DIR_ENV: &str = "PORTRISK_OUT_DIR";

/// All tunable parameters of the four analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub fishing: BoostParams,
    pub transshipment: BoostParams,
    pub thresholds: RiskThresholds,
    pub sampler: SamplerConfig,
    pub retention: RetentionConfig,
    pub parties: PartyAdjustments,
    pub bins: BinQuery,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fishing: BoostParams::fishing(),
            transshipment: BoostParams::transshipment(),
            thresholds: RiskThresholds::default(),
            sampler: SamplerConfig::default(),
            retention: RetentionConfig::default(),
            parties: PartyAdjustments::default(),
            bins: BinQuery::default(),
        }
    }
}

impl RunConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON, or
    /// [`Error::InvalidInput`] if a value is out of range.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, plus the errors
    /// of [`RunConfig::from_json`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cfg = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "loaded run configuration");
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for out-of-range boosting,
    /// threshold, sampler, retention or bin settings.
    pub fn validate(&self) -> Result<()> {
        self.fishing.validate()?;
        self.transshipment.validate()?;
        RiskThresholds::new(self.thresholds.lower, self.thresholds.upper)?;
        self.sampler.validate()?;
        self.retention.validate()?;
        if !(self.bins.bin_size > 0.0 && self.bins.bin_size.is_finite()) {
            return Err(Error::InvalidInput(format!("bin size must be positive, got {}", self.bins.bin_size)));
        }
        Ok(())
    }
}

fn resolve_dir(flag: Option<PathBuf>, env_var: &str) -> PathBuf {
    flag.or_else(|| std::env::var_os(env_var).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Input directory: flag, then [`DATA_DIR_ENV`], then `.`.
#[must_use]
pub fn data_dir(flag: Option<PathBuf>) -> PathBuf {
    resolve_dir(flag, DATA_DIR_ENV)
}

/// Output directory: flag, then [`OUT_DIR_ENV`], then `.`.
#[must_use]
pub fn out_dir(flag: Option<PathBuf>) -> PathBuf {
    resolve_dir(flag, OUT_DIR_ENV)
}
