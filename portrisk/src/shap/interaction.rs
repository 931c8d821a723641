// SPDX-License-Identifier: AGPL-3.0-or-later
//! SHAP interaction values for a boosted ensemble.
//!
//! For every sample the result is an `M × M` matrix `Φ`:
//!
//! - `Φ[j][k]` (`j ≠ k`) is half of the pairwise interaction between
//!   features `j` and `k`; the matrix is symmetric.
//! - `Φ[j][j]` is the main effect of `j`, so row `j` sums to the plain
//!   SHAP value of `j`.
//! - `ΣΣ Φ + expected_value = prediction`.
//!
//! Only features a tree actually splits on can interact inside it, so the
//! conditioned passes run per tree over its split features only.

use super::tree_shap::{tree_shap, Condition};
use crate::error::{Error, Result};
use crate::model::boost::GradientBooster;
use crate::model::tree::RegressionTree;
use std::collections::BTreeSet;

/// Dense `samples × features × features` interaction array.
#[derive(Debug, Clone)]
pub struct InteractionArray {
    n_samples: usize,
    n_features: usize,
    values: Vec<f64>,
    expected_value: f64,
}

impl InteractionArray {
    /// Number of samples.
    #[must_use]
    pub const fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of features.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Model expected value (the SHAP base value).
    #[must_use]
    pub const fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Row-major `M × M` matrix of sample `i`.
    #[must_use]
    pub fn matrix(&self, i: usize) -> &[f64] {
        let m2 = self.n_features * self.n_features;
        &self.values[i * m2..(i + 1) * m2]
    }

    /// `Φ[j][k]` of sample `i`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.matrix(i)[j * self.n_features + k]
    }

    /// Plain SHAP values of sample `i` (row sums).
    #[must_use]
    pub fn shap_values(&self, i: usize) -> Vec<f64> {
        self.matrix(i)
            .chunks_exact(self.n_features)
            .map(|row| row.iter().sum())
            .collect()
    }

    /// Sum of the full matrix of sample `i` plus the expected value.
    #[must_use]
    pub fn reconstructed_prediction(&self, i: usize) -> f64 {
        self.matrix(i).iter().sum::<f64>() + self.expected_value
    }

    /// Sum of `Φ[j][k]` over `j ∈ rows`, `k ∈ cols` for sample `i`.
    #[must_use]
    pub fn block_sum(&self, i: usize, rows: &[usize], cols: &[usize]) -> f64 {
        let m = self.matrix(i);
        rows.iter()
            .map(|&j| cols.iter().map(|&k| m[j * self.n_features + k]).sum::<f64>())
            .sum()
    }
}

/// Interaction values of `model` for every row of `samples`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a row width differs from the
/// model's feature count.
pub fn interaction_values(model: &GradientBooster, samples: &[Vec<f64>]) -> Result<InteractionArray> {
    let m = model.n_features();
    if let Some(bad) = samples.iter().position(|s| s.len() != m) {
        return Err(Error::InvalidInput(format!(
            "sample {bad} has {} features, model expects {m}",
            samples[bad].len()
        )));
    }
    let split_features: Vec<Vec<usize>> = model.trees().iter().map(split_features).collect();

    let mut values = vec![0.0; samples.len() * m * m];
    let mut phi = vec![0.0; m];
    let mut on = vec![0.0; m];
    let mut off = vec![0.0; m];

    for (i, x) in samples.iter().enumerate() {
        let out = &mut values[i * m * m..(i + 1) * m * m];
        for (tree, used) in model.trees().iter().zip(&split_features) {
            phi.fill(0.0);
            tree_shap(tree, x, &mut phi, Condition::None);
            for (j, p) in phi.iter().enumerate() {
                out[j * m + j] += p;
            }
            for &j in used {
                on.fill(0.0);
                off.fill(0.0);
                tree_shap(tree, x, &mut on, Condition::On(j));
                tree_shap(tree, x, &mut off, Condition::Off(j));
                for k in 0..m {
                    let val = (on[k] - off[k]) / 2.0;
                    out[j * m + k] += val;
                    out[j * m + j] -= val;
                }
            }
        }
    }
    tracing::debug!(
        samples = samples.len(),
        features = m,
        trees = model.n_estimators(),
        "computed SHAP interaction values"
    );

    Ok(InteractionArray {
        n_samples: samples.len(),
        n_features: m,
        values,
        expected_value: model.expected_value(),
    })
}

fn split_features(tree: &RegressionTree) -> Vec<usize> {
    tree.nodes()
        .iter()
        .filter_map(crate::model::tree::TreeNode::split_feature)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::boost::BoostParams;

    fn fitted() -> (GradientBooster, Vec<Vec<f64>>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40_u32 {
            let a = f64::from(i % 2);
            let b = f64::from((i / 2) % 2);
            let c = f64::from((i / 4) % 3 == 0);
            x.push(vec![a, b, c]);
            y.push(2.0f64.mul_add(a * b, c - a));
        }
        let params = BoostParams {
            learning_rate: 0.3,
            max_depth: 4,
            colsample_bytree: 1.0,
            n_trees: 20,
            eval_every: 0,
            ..BoostParams::fishing()
        };
        (GradientBooster::fit(&x, &y, &params).unwrap(), x)
    }

    #[test]
    fn matrix_reconstructs_prediction() {
        let (model, x) = fitted();
        let phi = interaction_values(&model, &x).unwrap();
        for (i, row) in x.iter().enumerate() {
            let pred = model.predict(row);
            assert!((phi.reconstructed_prediction(i) - pred).abs() < 1e-9);
        }
    }

    #[test]
    fn rows_sum_to_shap_values() {
        let (model, x) = fitted();
        let phi = interaction_values(&model, &x).unwrap();
        for (i, row) in x.iter().enumerate() {
            let mut plain = vec![0.0; 3];
            for tree in model.trees() {
                tree_shap(tree, row, &mut plain, Condition::None);
            }
            for (a, b) in phi.shap_values(i).iter().zip(&plain) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn matrix_is_symmetric() {
        let (model, x) = fitted();
        let phi = interaction_values(&model, &x).unwrap();
        for i in 0..phi.n_samples() {
            for j in 0..3 {
                for k in 0..3 {
                    assert!((phi.get(i, j, k) - phi.get(i, k, j)).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn block_sum_of_everything_is_total() {
        let (model, x) = fitted();
        let phi = interaction_values(&model, &x).unwrap();
        let all = [0, 1, 2];
        let total: f64 = phi.matrix(3).iter().sum();
        assert!((phi.block_sum(3, &all, &all) - total).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_width() {
        let (model, _) = fitted();
        assert!(interaction_values(&model, &[vec![1.0, 0.0]]).is_err());
    }
}
