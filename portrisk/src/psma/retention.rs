// SPDX-License-Identifier: AGPL-3.0-or-later
//! Drop low-traffic ports.
//!
//! Cells are ranked by visit count. The cutoff is the count of the first
//! cell at which the cumulative share of all visits exceeds the retention
//! fraction; a port with any cell below the cutoff is removed entirely,
//! so every remaining port keeps both of its years.

use super::visits::VisitCell;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Smallest accepted retention fraction.
pub const MIN_FRACTION: f64 = 0.95;
/// Largest accepted retention fraction.
pub const MAX_FRACTION: f64 = 0.99;

/// Cumulative-share threshold for keeping ports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub fraction: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { fraction: 0.95 }
    }
}

impl RetentionConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] outside
    /// [`MIN_FRACTION`]`..=`[`MAX_FRACTION`].
    pub fn new(fraction: f64) -> Result<Self> {
        let cfg = Self { fraction };
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] outside
    /// [`MIN_FRACTION`]`..=`[`MAX_FRACTION`].
    pub fn validate(&self) -> Result<()> {
        if (MIN_FRACTION..=MAX_FRACTION).contains(&self.fraction) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "retention fraction {} outside [{MIN_FRACTION}, {MAX_FRACTION}]",
                self.fraction
            )))
        }
    }
}

/// Visit count below which a cell marks its port for removal.
///
/// `None` for an empty or all-zero input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cutoff(cells: &[VisitCell], fraction: f64) -> Option<u64> {
    let mut counts: Vec<u64> = cells.iter().map(|c| c.n_visits).collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let mut cumulative = 0u64;
    counts.into_iter().find(|&n| {
        cumulative += n;
        cumulative as f64 / total as f64 > fraction
    })
}

/// Remove every port that has a cell below the cutoff.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a fraction outside the accepted
/// range, or [`Error::EmptySubset`] when no cells remain.
pub fn retain_ports(cells: Vec<VisitCell>, config: &RetentionConfig) -> Result<Vec<VisitCell>> {
    config.validate()?;
    let Some(cut) = cutoff(&cells, config.fraction) else {
        return Err(Error::EmptySubset("no port visits to retain".into()));
    };
    let removed: BTreeSet<String> = cells
        .iter()
        .filter(|c| c.n_visits < cut)
        .map(|c| c.port_iso3.clone())
        .collect();
    let kept: Vec<VisitCell> = cells
        .into_iter()
        .filter(|c| !removed.contains(&c.port_iso3))
        .collect();
    tracing::info!(
        cutoff = cut,
        removed_ports = removed.len(),
        cells = kept.len(),
        "applied retention threshold"
    );
    if kept.is_empty() {
        return Err(Error::EmptySubset("retention removed every port".into()));
    }
    Ok(kept)
}
