// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end analyses: read inputs, fit, write the output tables.
//!
//! Each submodule backs one binary. They share the fit-and-attribute
//! step, the importance/effect record layouts and input resolution.

pub mod at_sea;
pub mod bins;
pub mod psma;
pub mod transshipment;

use crate::error::{Error, Result};
use crate::model::{BoostParams, GradientBooster};
use crate::shap::{effect_table, importance_table, interaction_values, EffectRow, ImportanceRow};
use crate::stats;
use crate::trips::DesignMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locate `<stem>.csv`, falling back to `<stem>.csv.gz`.
///
/// # Errors
///
/// Returns [`Error::Io`] (not found) naming the plain path when neither
/// exists.
pub fn resolve_input(dir: &Path, stem: &str) -> Result<PathBuf> {
    let plain = dir.join(format!("{stem}.csv"));
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{stem}.csv.gz"));
    if gz.is_file() {
        return Ok(gz);
    }
    Err(Error::Io {
        path: plain,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "input table not found (.csv or .csv.gz)"),
    })
}

/// Row of `<prefix>_importance.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRecord {
    pub block_a: String,
    pub block_b: String,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub se: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl From<&ImportanceRow> for ImportanceRecord {
    fn from(row: &ImportanceRow) -> Self {
        Self {
            block_a: row.block_a.clone(),
            block_b: row.block_b.clone(),
            mean: row.summary.map(|s| s.mean),
            sd: row.summary.map(|s| s.sd),
            se: row.summary.map(|s| s.se),
            lower: row.summary.map(|s| s.lower),
            upper: row.summary.map(|s| s.upper),
        }
    }
}

/// Row of `<prefix>_effect.csv`. Statistics are empty when fewer than two
/// samples qualify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub feature_a: String,
    pub feature_b: Option<String>,
    pub n: usize,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub se: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl From<&EffectRow> for EffectRecord {
    fn from(row: &EffectRow) -> Self {
        Self {
            feature_a: row.feature_a.clone(),
            feature_b: row.feature_b.clone(),
            n: row.n,
            mean: row.summary.map(|s| s.mean),
            sd: row.summary.map(|s| s.sd),
            se: row.summary.map(|s| s.se),
            lower: row.summary.map(|s| s.lower),
            upper: row.summary.map(|s| s.upper),
        }
    }
}

/// A fitted model with its in-sample attribution.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub model: GradientBooster,
    /// In-sample predictions, row-aligned with the training design.
    pub fitted: Vec<f64>,
    /// Mean in-sample prediction.
    pub base: f64,
    pub importance: Vec<ImportanceRow>,
    pub effect: Vec<EffectRow>,
}

/// Fit the ensemble on `design`, then compute interaction values and both
/// attribution tables on the training rows.
///
/// # Errors
///
/// Propagates boosting, SHAP and attribution errors.
pub fn fit_and_attribute(design: &DesignMatrix, y: &[f64], params: &BoostParams) -> Result<FittedModel> {
    let model = GradientBooster::fit(design.rows(), y, params)?;
    let fitted = model.predict_batch(design.rows());
    let base = stats::mean(&fitted);
    let phi = interaction_values(&model, design.rows())?;
    let importance = importance_table(&phi, design)?;
    let effect = effect_table(&phi, design, base)?;
    tracing::info!(
        samples = design.n_rows(),
        features = design.n_cols(),
        base,
        importance_rows = importance.len(),
        effect_rows = effect.len(),
        "computed SHAP attribution"
    );
    Ok(FittedModel {
        model,
        fitted,
        base,
        importance,
        effect,
    })
}

/// Write `<prefix>_importance.csv` and `<prefix>_effect.csv` into `out`.
///
/// # Errors
///
/// Returns I/O or CSV errors from the writer.
pub fn write_attribution(out: &Path, prefix: &str, fitted: &FittedModel) -> Result<(PathBuf, PathBuf)> {
    let importance = out.join(format!("{prefix}_importance.csv"));
    let effect = out.join(format!("{prefix}_effect.csv"));
    crate::io::table::write_records(&importance, fitted.importance.iter().map(ImportanceRecord::from))?;
    crate::io::table::write_records(&effect, fitted.effect.iter().map(EffectRecord::from))?;
    Ok((importance, effect))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stats::{SdKind, Summary};
    use tempfile::TempDir;

    #[test]
    fn resolves_plain_then_gz() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(resolve_input(dir.path(), "t"), Err(Error::Io { .. })));
        std::fs::write(dir.path().join("t.csv.gz"), b"").unwrap();
        assert!(resolve_input(dir.path(), "t").unwrap().ends_with("t.csv.gz"));
        std::fs::write(dir.path().join("t.csv"), b"").unwrap();
        assert!(resolve_input(dir.path(), "t").unwrap().ends_with("t.csv"));
    }

    #[test]
    fn missing_summary_writes_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("effect.csv");
        let rows = [
            EffectRow {
                feature_a: "flag_china".into(),
                feature_b: None,
                n: 3,
                summary: Summary::of(&[1.0, 2.0, 3.0], SdKind::Population, 0.5),
            },
            EffectRow {
                feature_a: "flag_china".into(),
                feature_b: Some("tas_long".into()),
                n: 1,
                summary: None,
            },
        ];
        crate::io::table::write_records(&path, rows.iter().map(EffectRecord::from)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "feature_a,feature_b,n,mean,sd,se,lower,upper");
        assert!(lines[1].starts_with("flag_china,,3,2.5,"));
        assert_eq!(lines[2], "flag_china,tas_long,1,,,,,");
    }
}
