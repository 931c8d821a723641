// SPDX-License-Identifier: AGPL-3.0-or-later
//! Vessel trips, their risk scores, and model design matrices.
//!
//! - [`risk`]: tier counts, the risk score and risk classes
//! - [`encoding`]: one-hot design matrices with feature blocks
//! - [`fishing`]: at-sea fishing trips
//! - [`transshipment`]: carrier trips built from encounters and loitering

pub mod encoding;
pub mod fishing;
pub mod risk;
pub mod transshipment;

pub use encoding::{DesignMatrix, FeatureBlock, OneHotEncoder};
pub use risk::{RiskKind, RiskThresholds, TierCounts};
