// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tolerances used by the validation binary and the tests.
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Exact | integer counts, class labels | [`EXACT`] |
//! | Machine | f64 arithmetic | [`ANALYTICAL_F64`] |
//! | Accumulated | sums over trees and features | [`SHAP_ADDITIVITY`] |
//! | Monte Carlo | posterior draws | [`R_HAT_MAX`] |

// ═══════════════════════════════════════════════════════════════════
// Machine precision
// ═══════════════════════════════════════════════════════════════════

/// Counts and class labels.
pub const EXACT: f64 = 0.0;

/// Closed-form expressions (risk score, bin area).
pub const ANALYTICAL_F64: f64 = 1e-12;

// ═══════════════════════════════════════════════════════════════════
// Attribution
// ═══════════════════════════════════════════════════════════════════

/// Interaction values summed over all feature pairs plus the expected
/// value against the ensemble prediction.
///
/// Each of up to 300 trees contributes `O(depth²)` path updates per
/// feature; 1e-9 leaves room for that many roundings.
pub const SHAP_ADDITIVITY: f64 = 1e-9;

// ═══════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════

/// 1°×1° equatorial cell `[0°, 1°]`: `R²·(π/180)·sin(1°)` = 12 391.4 km².
pub const EQUATORIAL_CELL_KM2: f64 = 12_391.4;

/// Agreement with [`EQUATORIAL_CELL_KM2`] in km².
pub const AREA_KM2: f64 = 1.0;

// ═══════════════════════════════════════════════════════════════════
// Sampling
// ═══════════════════════════════════════════════════════════════════

/// Largest split R̂ accepted as converged.
pub const R_HAT_MAX: f64 = 1.05;

/// Posterior mean against a known simulation value, in posterior sds.
pub const POSTERIOR_MEAN_SDS: f64 = 3.0;
