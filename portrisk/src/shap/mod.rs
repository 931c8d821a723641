// SPDX-License-Identifier: AGPL-3.0-or-later
//! SHAP attribution for boosted tree ensembles.
//!
//! - [`tree_shap`]: path-dependent TreeSHAP for one tree, with optional
//!   conditioning on a feature being present or absent.
//! - [`interaction`]: the `samples × features × features` interaction
//!   array for a whole ensemble.
//! - [`attribution`]: block-pair importance and conditional-effect tables.

pub mod attribution;
pub mod interaction;
pub mod tree_shap;

pub use attribution::{effect_table, importance_table, EffectRow, ImportanceRow};
pub use interaction::{interaction_values, InteractionArray};
