// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block-level summaries of SHAP interaction values.
//!
//! Two tables are derived from an [`InteractionArray`] and the design
//! matrix it was computed on:
//!
//! - **importance**: for each unordered pair of feature blocks, the
//!   distribution over samples of `|Σ Φ|` within the block pair;
//! - **effect**: for each feature, and each pair of features that can be
//!   active together, the model's conditional prediction on the samples
//!   where they are active: the relevant group contributions plus the
//!   mean prediction.
//!
//! Off-diagonal block pairs always take both symmetric halves of `Φ`, so
//! the diagonal and off-diagonal contributions of every block pair add up
//! to the full matrix: `Σ contributions + expected value = prediction`.

use super::interaction::InteractionArray;
use crate::error::{Error, Result};
use crate::stats::{SdKind, Summary};
use crate::trips::encoding::DesignMatrix;

/// One row of the importance table.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRow {
    /// First block label.
    pub block_a: String,
    /// Second block label (equal to `block_a` on the diagonal).
    pub block_b: String,
    /// Summary of the absolute per-sample contribution.
    pub summary: Option<Summary>,
}

/// One row of the effect table.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRow {
    /// Design column of the first feature.
    pub feature_a: String,
    /// Design column of the second feature, `None` for a single feature.
    pub feature_b: Option<String>,
    /// Samples where the feature(s) are active.
    pub n: usize,
    /// Conditional-effect summary, `None` when `n < 2`.
    pub summary: Option<Summary>,
}

/// A set of design columns attributed together in the effect table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectGroup {
    /// Group label.
    pub name: String,
    /// Member columns.
    pub columns: Vec<usize>,
}

/// All unordered pairs of `0..n` with replacement, in lexicographic order.
#[must_use]
pub fn pairs_with_replacement(n: usize) -> Vec<(usize, usize)> {
    (0..n).flat_map(|a| (a..n).map(move |b| (a, b))).collect()
}

/// Per-sample contribution of every block pair.
///
/// Returns the pair list and `contrib[p][i]` for pair `p`, sample `i`.
#[must_use]
pub fn block_pair_contributions(
    phi: &InteractionArray,
    design: &DesignMatrix,
) -> (Vec<(usize, usize)>, Vec<Vec<f64>>) {
    let columns: Vec<Vec<usize>> = design
        .blocks()
        .iter()
        .map(|b| b.columns.clone().collect())
        .collect();
    let pairs = pairs_with_replacement(columns.len());
    let contrib = pairs
        .iter()
        .map(|&(a, b)| {
            (0..phi.n_samples())
                .map(|i| pair_sum(phi, i, &columns[a], &columns[b], a == b))
                .collect()
        })
        .collect();
    (pairs, contrib)
}

fn pair_sum(phi: &InteractionArray, i: usize, a: &[usize], b: &[usize], same: bool) -> f64 {
    if same {
        phi.block_sum(i, a, a)
    } else {
        phi.block_sum(i, a, b) + phi.block_sum(i, b, a)
    }
}

/// Importance table: absolute block-pair contributions summarized over
/// samples (sample sd).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the array and design disagree in
/// shape.
pub fn importance_table(phi: &InteractionArray, design: &DesignMatrix) -> Result<Vec<ImportanceRow>> {
    check_shape(phi, design)?;
    let (pairs, contrib) = block_pair_contributions(phi, design);
    let blocks = design.blocks();
    Ok(pairs
        .iter()
        .zip(contrib)
        .map(|(&(a, b), values)| {
            let abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
            ImportanceRow {
                block_a: blocks[a].name.clone(),
                block_b: blocks[b].name.clone(),
                summary: Summary::of(&abs, SdKind::Sample, 0.0),
            }
        })
        .collect())
}

/// Attribution groups for the effect table.
///
/// Exclusive blocks stay whole (their columns never co-occur, so the
/// block's contribution is the active column's contribution). Multi-hot
/// blocks split into one group per column.
#[must_use]
pub fn effect_groups(design: &DesignMatrix) -> Vec<EffectGroup> {
    let mut groups = Vec::new();
    for block in design.blocks() {
        if block.exclusive {
            groups.push(EffectGroup {
                name: block.name.clone(),
                columns: block.columns.clone().collect(),
            });
        } else {
            for j in block.columns.clone() {
                groups.push(EffectGroup {
                    name: design.columns()[j].clone(),
                    columns: vec![j],
                });
            }
        }
    }
    groups
}

/// Column pairs `(a, b)`, `a <= b`, that can be active in the same row.
///
/// Distinct columns of one exclusive block are dropped: a trip has one
/// flag group, so "flag A and flag B" has no samples by construction.
#[must_use]
pub fn feature_combinations(design: &DesignMatrix) -> Vec<(usize, usize)> {
    pairs_with_replacement(design.n_cols())
        .into_iter()
        .filter(|&(a, b)| {
            a == b
                || !design
                    .blocks()
                    .iter()
                    .any(|blk| blk.exclusive && blk.contains(a) && blk.contains(b))
        })
        .collect()
}

/// Effect table: conditional predictions for single features (first,
/// in column order) and feature pairs.
///
/// `base` is added to the mean and the percentiles; it is the mean
/// in-sample prediction. The sd column uses the population denominator
/// and the se column the sample one.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the array and design disagree in
/// shape.
pub fn effect_table(phi: &InteractionArray, design: &DesignMatrix, base: f64) -> Result<Vec<EffectRow>> {
    check_shape(phi, design)?;
    let groups = effect_groups(design);
    let n_groups = groups.len();
    let mut group_of = vec![0; design.n_cols()];
    for (g, group) in groups.iter().enumerate() {
        for &j in &group.columns {
            group_of[j] = g;
        }
    }

    // gp[i][g * G + h]: Σ Φ over rows in group g, columns in group h.
    let gp: Vec<Vec<f64>> = (0..phi.n_samples())
        .map(|i| {
            let mut m = vec![0.0; n_groups * n_groups];
            for g in 0..n_groups {
                for h in 0..n_groups {
                    m[g * n_groups + h] = phi.block_sum(i, &groups[g].columns, &groups[h].columns);
                }
            }
            m
        })
        .collect();
    let diag = |i: usize, g: usize| gp[i][g * n_groups + g];
    let cross = |i: usize, g: usize, h: usize| gp[i][g * n_groups + h] + gp[i][h * n_groups + g];

    let combos = feature_combinations(design);
    let (solo, paired): (Vec<_>, Vec<_>) = combos.into_iter().partition(|(a, b)| a == b);
    let names = design.columns();
    let mut rows = Vec::with_capacity(solo.len() + paired.len());

    for (a, _) in solo {
        let ga = group_of[a];
        let values: Vec<f64> = (0..design.n_rows())
            .filter(|&i| design.is_active(i, a))
            .map(|i| diag(i, ga))
            .collect();
        rows.push(EffectRow {
            feature_a: names[a].clone(),
            feature_b: None,
            n: values.len(),
            summary: Summary::of(&values, SdKind::Population, base),
        });
    }
    for (a, b) in paired {
        let (ga, gb) = (group_of[a], group_of[b]);
        let values: Vec<f64> = (0..design.n_rows())
            .filter(|&i| design.is_active(i, a) && design.is_active(i, b))
            .map(|i| diag(i, ga) + diag(i, gb) + cross(i, ga, gb))
            .collect();
        rows.push(EffectRow {
            feature_a: names[a].clone(),
            feature_b: Some(names[b].clone()),
            n: values.len(),
            summary: Summary::of(&values, SdKind::Population, base),
        });
    }
    Ok(rows)
}

fn check_shape(phi: &InteractionArray, design: &DesignMatrix) -> Result<()> {
    if phi.n_samples() != design.n_rows() || phi.n_features() != design.n_cols() {
        return Err(Error::InvalidInput(format!(
            "interaction array is {}×{} but design is {}×{}",
            phi.n_samples(),
            phi.n_features(),
            design.n_rows(),
            design.n_cols()
        )));
    }
    Ok(())
}
