// SPDX-License-Identifier: AGPL-3.0-or-later
//! Regression tree used as the boosting weak learner.
//!
//! Array-based representation: node 0 is the root, children are indices
//! into the same vector. Each node carries its *cover* (sum of training
//! hessians reaching it; the sample count for squared error), which the
//! path-dependent TreeSHAP algorithm uses as the conditional weight of
//! each branch.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Node in a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index to split on (negative = leaf node).
    pub feature: i32,
    /// Split threshold; samples with `feat_val <= threshold` go left.
    pub threshold: f64,
    /// Left child node index (`-1` for leaves).
    pub left_child: i32,
    /// Right child node index (`-1` for leaves).
    pub right_child: i32,
    /// Output for samples ending here (already scaled by the learning rate).
    pub value: f64,
    /// Training cover (hessian sum).
    pub cover: f64,
}

impl TreeNode {
    /// Leaf with the given value and cover.
    #[must_use]
    pub const fn leaf(value: f64, cover: f64) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left_child: -1,
            right_child: -1,
            value,
            cover,
        }
    }

    /// Returns `true` if this node is a leaf.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.feature < 0
    }

    /// Split feature index, `None` for leaves.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn split_feature(&self) -> Option<usize> {
        if self.feature < 0 {
            None
        } else {
            Some(self.feature as usize)
        }
    }

    /// Child index followed by `feat_val`.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn child_for(&self, feat_val: f64) -> usize {
        if feat_val <= self.threshold {
            self.left_child as usize
        } else {
            self.right_child as usize
        }
    }

    /// Left and right child indices of an internal node.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn children(&self) -> (usize, usize) {
        (self.left_child as usize, self.right_child as usize)
    }
}

/// A regression tree (predicts additive f64 contributions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Build from a node vector, validating child pointers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the tree is empty, a child index
    /// is out of range or does not point forward, or a cover is negative.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::InvalidInput("empty tree".into()));
        }
        let n = nodes.len();
        for (i, node) in nodes.iter().enumerate() {
            if node.cover < 0.0 || node.cover.is_nan() {
                return Err(Error::InvalidInput(format!("node {i} has invalid cover")));
            }
            if node.is_leaf() {
                continue;
            }
            for child in [node.left_child, node.right_child] {
                if child <= i32::try_from(i).unwrap_or(i32::MAX) || child as usize >= n {
                    return Err(Error::InvalidInput(format!(
                        "node {i} has invalid child {child}"
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Build from parallel arrays.
    ///
    /// # Errors
    ///
    /// Returns `Err` if arrays have inconsistent lengths or invalid links.
    pub fn from_arrays(
        features: &[i32],
        thresholds: &[f64],
        left_children: &[i32],
        right_children: &[i32],
        values: &[f64],
        covers: &[f64],
    ) -> Result<Self> {
        let n = features.len();
        if thresholds.len() != n
            || left_children.len() != n
            || right_children.len() != n
            || values.len() != n
            || covers.len() != n
        {
            return Err(Error::InvalidInput("inconsistent array lengths".into()));
        }
        let nodes = (0..n)
            .map(|i| TreeNode {
                feature: features[i],
                threshold: thresholds[i],
                left_child: left_children[i],
                right_child: right_children[i],
                value: values[i],
                cover: covers[i],
            })
            .collect();
        Self::from_nodes(nodes)
    }

    /// Predict the contribution for a single sample.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let Some(f) = node.split_feature() else {
                return node.value;
            };
            let feat_val = features.get(f).copied().unwrap_or(0.0);
            idx = node.child_for(feat_val);
        }
    }

    /// Cover-weighted mean leaf value: the tree's expected output over
    /// the training distribution.
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        let root = self.nodes[0].cover;
        if root <= 0.0 {
            return self.nodes[0].value;
        }
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.cover * n.value)
            .sum::<f64>()
            / root
    }

    /// All nodes, root first.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Longest root-to-leaf path (a single leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        let node = &self.nodes[idx];
        if node.is_leaf() {
            return 0;
        }
        let (left, right) = node.children();
        1 + self.node_depth(left).max(self.node_depth(right))
    }
}
