// SPDX-License-Identifier: AGPL-3.0-or-later
//! Path-dependent TreeSHAP for a single regression tree.
//!
//! Polynomial-time exact Shapley values where the value of a coalition
//! `S` is the tree output with features outside `S` integrated out using
//! the training covers of each branch (Lundberg et al. 2018, Algorithm 2).
//!
//! The recursion keeps the "unique path" of features met from the root:
//! for every element the fraction of training cover that flows through
//! when the feature is absent (`zero`) or present (`one`), plus the
//! permutation weight of each subset size. Leaves distribute their value
//! to every feature on the path.
//!
//! A [`Condition`] pins one feature as always present (`On`) or always
//! absent (`Off`). Half the difference of the two conditioned runs gives
//! the pairwise interaction values.
//!
//! # References
//!
//! - Lundberg, Erion & Lee 2018, *Consistent individualized feature
//!   attribution for tree ensembles*, arXiv:1802.03888

use crate::model::tree::RegressionTree;

/// Feature conditioning applied during one TreeSHAP pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Plain SHAP values.
    None,
    /// Feature always in the coalition.
    On(usize),
    /// Feature never in the coalition.
    Off(usize),
}

impl Condition {
    const fn feature(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::On(f) | Self::Off(f) => Some(f),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Add this tree's SHAP values for sample `x` into `phi`.
///
/// `phi` has one slot per feature; the tree's expected value is not
/// included (see [`RegressionTree::expected_value`]).
pub fn tree_shap(tree: &RegressionTree, x: &[f64], phi: &mut [f64], condition: Condition) {
    let walker = Walker {
        tree,
        x,
        condition,
    };
    walker.recurse(phi, 0, &[], 1.0, 1.0, None, 1.0);
}

struct Walker<'a> {
    tree: &'a RegressionTree,
    x: &'a [f64],
    condition: Condition,
}

impl Walker<'_> {
    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &self,
        phi: &mut [f64],
        node_index: usize,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        parent_feature: Option<usize>,
        condition_fraction: f64,
    ) {
        if condition_fraction == 0.0 {
            return;
        }
        let mut path = parent_path.to_vec();
        let conditioned = self.condition.feature();
        if conditioned.is_none() || conditioned != parent_feature {
            extend_path(&mut path, zero_fraction, one_fraction, parent_feature);
        }

        let node = &self.tree.nodes()[node_index];
        let Some(split) = node.split_feature() else {
            let depth = path.len() - 1;
            for i in 1..=depth {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * condition_fraction * node.value;
                }
            }
            return;
        };

        let hot = node.child_for(self.x.get(split).copied().unwrap_or(0.0));
        let (left, right) = node.children();
        let cold = if hot == left { right } else { left };
        let nodes = self.tree.nodes();
        let w = node.cover;
        let (hot_zero, cold_zero) = if w > 0.0 {
            (nodes[hot].cover / w, nodes[cold].cover / w)
        } else {
            (0.0, 0.0)
        };

        // A feature split on again lower in the tree is removed and
        // re-added with the combined fractions.
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(k) = path.iter().position(|el| el.feature == Some(split)) {
            incoming_zero = path[k].zero_fraction;
            incoming_one = path[k].one_fraction;
            unwind_path(&mut path, k);
        }

        let mut hot_condition = condition_fraction;
        let mut cold_condition = condition_fraction;
        match self.condition {
            Condition::On(c) if c == split => cold_condition = 0.0,
            Condition::Off(c) if c == split => {
                hot_condition *= hot_zero;
                cold_condition *= cold_zero;
            }
            _ => {}
        }

        self.recurse(
            phi,
            hot,
            &path,
            hot_zero * incoming_zero,
            incoming_one,
            Some(split),
            hot_condition,
        );
        self.recurse(
            phi,
            cold,
            &path,
            cold_zero * incoming_zero,
            0.0,
            Some(split),
            cold_condition,
        );
    }
}

#[allow(clippy::cast_precision_loss)]
fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let d = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if d == 0 { 1.0 } else { 0.0 },
    });
    let denom = (d + 1) as f64;
    for i in (0..d).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (d - i) as f64 / denom;
    }
}

#[allow(clippy::cast_precision_loss)]
fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let d = path.len() - 1;
    let one = path[path_index].one_fraction;
    let zero = path[path_index].zero_fraction;
    let denom = (d + 1) as f64;
    let mut next_one_portion = path[d].pweight;
    for i in (0..d).rev() {
        if one == 0.0 {
            path[i].pweight = path[i].pweight * denom / (zero * (d - i) as f64);
        } else {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].pweight * zero * (d - i) as f64 / denom;
        }
    }
    for i in path_index..d {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

#[allow(clippy::cast_precision_loss)]
fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let d = path.len() - 1;
    let one = path[path_index].one_fraction;
    let zero = path[path_index].zero_fraction;
    let denom = (d + 1) as f64;
    let mut next_one_portion = path[d].pweight;
    let mut total = 0.0;
    for i in (0..d).rev() {
        if one == 0.0 {
            total += path[i].pweight / zero * denom / (d - i) as f64;
        } else {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero * (d - i) as f64 / denom;
        }
    }
    total
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;

    /// f0 <= 0.5:
    ///   f1 <= 0.5 → 1.0 (cover 30) else → 4.0 (cover 10)
    /// else:
    ///   f2 <= 0.5 → -2.0 (cover 15) else:
    ///     f0 <= 1.5 → 3.0 (cover 3) else → 0.5 (cover 2)
    fn sample_tree() -> RegressionTree {
        RegressionTree::from_arrays(
            &[0, 1, -1, -1, 2, -1, 0, -1, -1],
            &[0.5, 0.5, 0.0, 0.0, 0.5, 0.0, 1.5, 0.0, 0.0],
            &[1, 2, -1, -1, 5, -1, 7, -1, -1],
            &[4, 3, -1, -1, 6, -1, 8, -1, -1],
            &[0.0, 0.0, 1.0, 4.0, 0.0, -2.0, 0.0, 3.0, 0.5],
            &[60.0, 40.0, 30.0, 10.0, 20.0, 15.0, 5.0, 3.0, 2.0],
        )
        .unwrap()
    }

    /// Cover-weighted expectation of the tree given features in `mask`.
    fn cond_expectation(tree: &RegressionTree, x: &[f64], mask: u32, idx: usize) -> f64 {
        let node = &tree.nodes()[idx];
        let Some(f) = node.split_feature() else {
            return node.value;
        };
        if mask & (1 << f) != 0 {
            return cond_expectation(tree, x, mask, node.child_for(x[f]));
        }
        let (l, r) = node.children();
        let nodes = tree.nodes();
        (nodes[l].cover * cond_expectation(tree, x, mask, l)
            + nodes[r].cover * cond_expectation(tree, x, mask, r))
            / node.cover
    }

    fn factorial(n: usize) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    fn brute_shap(tree: &RegressionTree, x: &[f64], m: usize) -> Vec<f64> {
        let v = |s: u32| cond_expectation(tree, x, s, 0);
        (0..m)
            .map(|i| {
                let mut phi = 0.0;
                for s in 0..(1_u32 << m) {
                    if s & (1 << i) != 0 {
                        continue;
                    }
                    let size = s.count_ones() as usize;
                    let w = factorial(size) * factorial(m - size - 1) / factorial(m);
                    phi += w * (v(s | (1 << i)) - v(s));
                }
                phi
            })
            .collect()
    }

    fn brute_interaction(tree: &RegressionTree, x: &[f64], m: usize, i: usize, j: usize) -> f64 {
        let v = |s: u32| cond_expectation(tree, x, s, 0);
        let mut total = 0.0;
        for s in 0..(1_u32 << m) {
            if s & ((1 << i) | (1 << j)) != 0 {
                continue;
            }
            let size = s.count_ones() as usize;
            let w = factorial(size) * factorial(m - size - 2) / (2.0 * factorial(m - 1));
            let grad = v(s | (1 << i) | (1 << j)) - v(s | (1 << i)) - v(s | (1 << j)) + v(s);
            total += w * grad;
        }
        total
    }

    const POINTS: [[f64; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [0.0, 1.0, 1.0],
        [1.0, 0.0, 1.0],
        [2.0, 1.0, 1.0],
    ];

    #[test]
    fn shap_values_sum_to_prediction() {
        let tree = sample_tree();
        for x in &POINTS {
            let mut phi = vec![0.0; 3];
            tree_shap(&tree, x, &mut phi, Condition::None);
            let total: f64 = phi.iter().sum::<f64>() + tree.expected_value();
            assert!(
                (total - tree.predict(x)).abs() < 1e-12,
                "x={x:?}: {total} vs {}",
                tree.predict(x)
            );
        }
    }

    #[test]
    fn shap_values_match_brute_force() {
        let tree = sample_tree();
        for x in &POINTS {
            let mut phi = vec![0.0; 3];
            tree_shap(&tree, x, &mut phi, Condition::None);
            let expected = brute_shap(&tree, x, 3);
            for (a, b) in phi.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-12, "x={x:?}: {phi:?} vs {expected:?}");
            }
        }
    }

    #[test]
    fn conditioned_difference_matches_brute_interaction() {
        let tree = sample_tree();
        for x in &POINTS {
            for j in 0..3 {
                let mut on = vec![0.0; 3];
                let mut off = vec![0.0; 3];
                tree_shap(&tree, x, &mut on, Condition::On(j));
                tree_shap(&tree, x, &mut off, Condition::Off(j));
                for k in (0..3).filter(|&k| k != j) {
                    let fast = (on[k] - off[k]) / 2.0;
                    let slow = brute_interaction(&tree, x, 3, j, k);
                    assert!((fast - slow).abs() < 1e-12, "x={x:?} ({j},{k}): {fast} vs {slow}");
                }
                assert!(on[j].abs() < 1e-15 && off[j].abs() < 1e-15);
            }
        }
    }

    #[test]
    fn unused_feature_gets_zero() {
        let tree = RegressionTree::from_arrays(
            &[1, -1, -1],
            &[0.5, 0.0, 0.0],
            &[1, -1, -1],
            &[2, -1, -1],
            &[0.0, -1.0, 1.0],
            &[4.0, 2.0, 2.0],
        )
        .unwrap();
        let mut phi = vec![0.0; 3];
        tree_shap(&tree, &[5.0, 1.0, 7.0], &mut phi, Condition::None);
        assert!(phi[0].abs() < 1e-15);
        assert!(phi[2].abs() < 1e-15);
        assert!((phi[1] - 1.0).abs() < 1e-12);
    }
}
