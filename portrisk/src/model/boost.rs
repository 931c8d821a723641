// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gradient-boosted regression trees with squared-error loss.
//!
//! Sequential ensemble of regression trees. Each tree fits the negative
//! gradient of the current cumulative prediction; the final output is a
//! base score plus the sum of all (learning-rate scaled) tree outputs.
//!
//! # Training
//!
//! Exact greedy split search with second-order gain, as in xgboost:
//!
//! ```text
//! gain   = G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)
//! weight = −η · G/(H+λ)
//! ```
//!
//! For squared error every hessian is 1, so `H` is the sample count and
//! `min_child_weight` is a minimum leaf size. Each tree sees a random
//! subset of the columns (`colsample_bytree`), drawn from a seeded RNG so
//! fits are reproducible.

use super::tree::{RegressionTree, TreeNode};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Minimum loss reduction for a split to be kept.
const MIN_SPLIT_GAIN: f64 = 1e-6;

/// Fixed boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostParams {
    /// Learning rate (`eta`).
    pub learning_rate: f64,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// Fraction of columns sampled per tree.
    pub colsample_bytree: f64,
    /// Number of boosting rounds.
    pub n_trees: usize,
    /// L2 penalty on leaf weights (`lambda`).
    pub lambda: f64,
    /// Initial prediction for every sample.
    pub base_score: f64,
    /// Log training RMSE every this many rounds (0 disables).
    pub eval_every: usize,
    /// Column-sampling seed.
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self::fishing()
    }
}

impl BoostParams {
    /// Preset for at-sea fishing trips.
    #[must_use]
    pub const fn fishing() -> Self {
        Self {
            learning_rate: 0.05,
            max_depth: 10,
            min_child_weight: 1.0,
            colsample_bytree: 0.6,
            n_trees: 100,
            lambda: 1.0,
            base_score: 0.5,
            eval_every: 10,
            seed: 0,
        }
    }

    /// Preset for transshipment trips.
    #[must_use]
    pub const fn transshipment() -> Self {
        Self {
            learning_rate: 0.01,
            n_trees: 300,
            eval_every: 50,
            ..Self::fishing()
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a non-positive learning rate,
    /// a column fraction outside `(0, 1]`, negative penalties or zero
    /// rounds.
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(Error::InvalidInput("learning_rate must be positive".into()));
        }
        if self.colsample_bytree.is_nan()
            || self.colsample_bytree <= 0.0
            || self.colsample_bytree > 1.0
        {
            return Err(Error::InvalidInput(
                "colsample_bytree must be in (0, 1]".into(),
            ));
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(Error::InvalidInput(
                "lambda and min_child_weight must be non-negative".into(),
            ));
        }
        if self.n_trees == 0 {
            return Err(Error::InvalidInput("n_trees must be at least 1".into()));
        }
        Ok(())
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn columns_per_tree(&self, n_features: usize) -> usize {
        let k = (self.colsample_bytree * n_features as f64).round() as usize;
        k.clamp(1, n_features)
    }
}

/// A fitted gradient-boosted regression ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBooster {
    trees: Vec<RegressionTree>,
    base_score: f64,
    n_features: usize,
}

impl GradientBooster {
    /// Assemble an ensemble from pre-built trees.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `trees` is empty.
    pub fn new(trees: Vec<RegressionTree>, base_score: f64, n_features: usize) -> Result<Self> {
        if trees.is_empty() {
            return Err(Error::InvalidInput("empty ensemble".into()));
        }
        Ok(Self {
            trees,
            base_score,
            n_features,
        })
    }

    /// Fit an ensemble on `samples` (rows) and targets `y`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySubset`] for no samples, and
    /// [`Error::InvalidInput`] for ragged rows, mismatched targets,
    /// non-finite targets or invalid parameters.
    pub fn fit(samples: &[Vec<f64>], y: &[f64], params: &BoostParams) -> Result<Self> {
        params.validate()?;
        if samples.is_empty() {
            return Err(Error::EmptySubset("no training samples".into()));
        }
        if samples.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} samples but {} targets",
                samples.len(),
                y.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("non-finite training target".into()));
        }
        let n_features = samples[0].len();
        if n_features == 0 || samples.iter().any(|s| s.len() != n_features) {
            return Err(Error::InvalidInput("ragged or empty feature rows".into()));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut all_columns: Vec<usize> = (0..n_features).collect();
        let k = params.columns_per_tree(n_features);
        let mut pred = vec![params.base_score; samples.len()];
        let mut trees = Vec::with_capacity(params.n_trees);

        for round in 0..params.n_trees {
            all_columns.shuffle(&mut rng);
            let mut columns = all_columns[..k].to_vec();
            columns.sort_unstable();

            let grad: Vec<f64> = pred.iter().zip(y).map(|(p, t)| p - t).collect();
            let tree = TreeBuilder {
                samples,
                grad: &grad,
                columns: &columns,
                params,
            }
            .build()?;
            for (p, s) in pred.iter_mut().zip(samples) {
                *p += tree.predict(s);
            }
            trees.push(tree);

            if params.eval_every > 0 && ((round + 1) % params.eval_every == 0 || round == 0) {
                tracing::info!(round = round + 1, train_rmse = rmse(&pred, y), "boosting");
            }
        }

        Self::new(trees, params.base_score, n_features)
    }

    /// Predict a single sample.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Batch prediction.
    #[must_use]
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    /// Expected output over the training distribution (SHAP base value).
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(RegressionTree::expected_value).sum::<f64>()
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Number of boosting rounds (trees).
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Base score.
    #[must_use]
    pub const fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Number of features.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Root-mean-square error.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rmse(pred: &[f64], y: &[f64]) -> f64 {
    if pred.is_empty() {
        return f64::NAN;
    }
    let sse: f64 = pred.iter().zip(y).map(|(p, t)| (p - t) * (p - t)).sum();
    (sse / pred.len() as f64).sqrt()
}

struct TreeBuilder<'a> {
    samples: &'a [Vec<f64>],
    grad: &'a [f64],
    columns: &'a [usize],
    params: &'a BoostParams,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn build(&self) -> Result<RegressionTree> {
        let mut nodes = Vec::new();
        let idx: Vec<usize> = (0..self.samples.len()).collect();
        self.grow(&mut nodes, idx, 0);
        RegressionTree::from_nodes(nodes)
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -self.params.learning_rate * g / (h + self.params.lambda)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn grow(&self, nodes: &mut Vec<TreeNode>, idx: Vec<usize>, depth: usize) -> usize {
        let g: f64 = idx.iter().map(|&i| self.grad[i]).sum();
        let h = idx.len() as f64;
        let at = nodes.len();
        nodes.push(TreeNode::leaf(self.leaf_weight(g, h), h));

        if depth >= self.params.max_depth {
            return at;
        }
        let Some(split) = self.best_split(&idx, g, h) else {
            return at;
        };
        tracing::trace!(depth, feature = split.feature, gain = split.gain, "split");

        let (left, right): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.samples[i][split.feature] <= split.threshold);
        let left_at = self.grow(nodes, left, depth + 1);
        let right_at = self.grow(nodes, right, depth + 1);

        let node = &mut nodes[at];
        node.feature = split.feature as i32;
        node.threshold = split.threshold;
        node.left_child = left_at as i32;
        node.right_child = right_at as i32;
        at
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, idx: &[usize], g: f64, h: f64) -> Option<Split> {
        let lambda = self.params.lambda;
        let mcw = self.params.min_child_weight;
        let parent = g * g / (h + lambda);
        let mut best: Option<Split> = None;
        let mut order = idx.to_vec();

        for &f in self.columns {
            order.sort_by(|&a, &b| self.samples[a][f].total_cmp(&self.samples[b][f]));
            let mut gl = 0.0;
            let mut hl = 0.0;
            for w in 0..order.len().saturating_sub(1) {
                let i = order[w];
                gl += self.grad[i];
                hl += 1.0;
                let v = self.samples[i][f];
                let next = self.samples[order[w + 1]][f];
                if next <= v {
                    continue;
                }
                let hr = h - hl;
                if hl < mcw || hr < mcw {
                    continue;
                }
                let gr = g - gl;
                let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature: f,
                        threshold: 0.5 * (v + next),
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;

    /// y = a + 2b + 3ab over four cells of ten samples each.
    fn interaction_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for rep in 0..10 {
            for a in 0..2 {
                for b in 0..2 {
                    let (fa, fb) = (f64::from(a), f64::from(b));
                    x.push(vec![fa, fb, f64::from(rep % 2)]);
                    y.push(3.0f64.mul_add(fa * fb, 2.0f64.mul_add(fb, fa)));
                }
            }
        }
        (x, y)
    }

    fn params() -> BoostParams {
        BoostParams {
            learning_rate: 0.3,
            max_depth: 3,
            colsample_bytree: 1.0,
            n_trees: 30,
            eval_every: 0,
            ..BoostParams::fishing()
        }
    }

    #[test]
    fn boosting_reduces_training_error() {
        let (x, y) = interaction_data();
        let short = GradientBooster::fit(&x, &y, &BoostParams { n_trees: 1, ..params() }).unwrap();
        let long = GradientBooster::fit(&x, &y, &params()).unwrap();
        let e1 = rmse(&short.predict_batch(&x), &y);
        let e2 = rmse(&long.predict_batch(&x), &y);
        assert!(e2 < e1, "rmse {e2} should be below {e1}");
        assert!(e2 < 0.1, "30 rounds at eta 0.3 should fit four cells, rmse {e2}");
    }

    #[test]
    fn expected_value_matches_mean_training_prediction() {
        let (x, y) = interaction_data();
        let model = GradientBooster::fit(&x, &y, &params()).unwrap();
        let preds = model.predict_batch(&x);
        let mean = preds.iter().sum::<f64>() / preds.len() as f64;
        assert!((model.expected_value() - mean).abs() < 1e-9);
    }

    #[test]
    fn depth_limit_respected() {
        let (x, y) = interaction_data();
        let model =
            GradientBooster::fit(&x, &y, &BoostParams { max_depth: 1, ..params() }).unwrap();
        assert!(model.trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn min_child_weight_limits_leaf_size() {
        let (x, y) = interaction_data();
        let p = BoostParams {
            min_child_weight: 15.0,
            ..params()
        };
        let model = GradientBooster::fit(&x, &y, &p).unwrap();
        for tree in model.trees() {
            for node in tree.nodes().iter().filter(|n| n.is_leaf()) {
                assert!(node.cover >= 15.0);
            }
        }
    }

    #[test]
    fn seeded_fit_is_reproducible() {
        let (x, y) = interaction_data();
        let p = BoostParams {
            colsample_bytree: 0.6,
            ..params()
        };
        let a = GradientBooster::fit(&x, &y, &p).unwrap();
        let b = GradientBooster::fit(&x, &y, &p).unwrap();
        for (pa, pb) in a.predict_batch(&x).iter().zip(b.predict_batch(&x)) {
            assert_eq!(pa.to_bits(), pb.to_bits());
        }
    }

    #[test]
    fn constant_target_gives_leaf_only_trees() {
        let x = vec![vec![0.0], vec![1.0], vec![0.0]];
        let y = vec![0.5; 3];
        let model = GradientBooster::fit(&x, &y, &params()).unwrap();
        assert!(model.trees().iter().all(|t| t.n_nodes() == 1));
        assert!((model.predict(&[1.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(GradientBooster::fit(&[], &[], &params()).is_err());
        assert!(GradientBooster::fit(&[vec![1.0]], &[1.0, 2.0], &params()).is_err());
        assert!(GradientBooster::fit(&[vec![1.0]], &[f64::NAN], &params()).is_err());
        let bad = BoostParams {
            colsample_bytree: 0.0,
            ..params()
        };
        assert!(GradientBooster::fit(&[vec![1.0]], &[1.0], &bad).is_err());
    }

    #[test]
    fn presets() {
        let f = BoostParams::fishing();
        let t = BoostParams::transshipment();
        assert!((f.learning_rate - 0.05).abs() < 1e-12);
        assert_eq!(f.n_trees, 100);
        assert!((t.learning_rate - 0.01).abs() < 1e-12);
        assert_eq!(t.n_trees, 300);
        assert_eq!(t.max_depth, 10);
        assert_eq!(f.columns_per_tree(19), 11);
    }
}
