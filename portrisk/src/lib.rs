// SPDX-License-Identifier: AGPL-3.0-or-later
//! portrisk: port-risk analyses for vessel trip data
//!
//! Batch analyses:
//! - risk scores for at-sea fishing trips from port-inspection tiers,
//!   extended to unassessed trips with gradient-boosted trees
//! - the same for transshipment (carrier) trips
//! - SHAP-interaction importance and conditional-effect tables for both
//! - a hierarchical Bayesian before/after model of foreign-vessel port
//!   visits around PSMA ratification
//! - fishing hours per spatial bin and risk class, with geodesic areas
//!
//! Each analysis is one binary under `src/bin/` backed by a module in
//! [`pipeline`]. Binaries share no runtime state.

pub mod bayes;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod psma;
pub mod shap;
pub mod spatial;
pub mod stats;
pub mod tolerances;
pub mod trips;
pub mod validation;

pub use error::{Error, Result};
