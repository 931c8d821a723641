// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gradient-boosted regression trees.
//!
//! [`tree`] holds the array-based tree shared by training, prediction
//! and SHAP; [`boost`] fits the ensemble.

pub mod boost;
pub mod tree;

pub use boost::{BoostParams, GradientBooster};
pub use tree::{RegressionTree, TreeNode};
