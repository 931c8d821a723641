// SPDX-License-Identifier: AGPL-3.0-or-later
//! Descriptive statistics shared by the attribution and posterior summaries.
//!
//! Moments come from `statrs`; percentiles use linear interpolation
//! between order statistics (Hyndman & Fan type 7).

use statrs::statistics::Statistics;

/// Arithmetic mean. `NaN` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation (denominator `n - 1`). `NaN` when `n < 2`.
#[must_use]
pub fn sample_sd(values: &[f64]) -> f64 {
    values.iter().std_dev()
}

/// Population standard deviation (denominator `n`).
#[must_use]
pub fn population_sd(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Standard error of the mean, `sd(n - 1) / sqrt(n)`. `NaN` when `n < 2`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn standard_error(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    sample_sd(values) / (values.len() as f64).sqrt()
}

/// Percentile with linear interpolation, `q` in `[0, 1]`.
///
/// `NaN` for an empty slice or a `q` outside the unit interval.
///
/// ```
/// use portrisk::stats::percentile;
///
/// assert!((percentile(&[1.0, 2.0, 3.0, 4.0], 0.5) - 2.5).abs() < 1e-12);
/// ```
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    (sorted[hi] - sorted[lo]).mul_add(frac, sorted[lo])
}

/// Five-number summary written to every attribution and posterior table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Mean.
    pub mean: f64,
    /// Standard deviation.
    pub sd: f64,
    /// Standard error of the mean.
    pub se: f64,
    /// 2.5th percentile.
    pub lower: f64,
    /// 97.5th percentile.
    pub upper: f64,
}

/// Which denominator the `sd` column uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdKind {
    /// `n - 1`.
    Sample,
    /// `n`.
    Population,
}

/// Lower and upper percentile of the reported 95% interval.
pub const INTERVAL: (f64, f64) = (0.025, 0.975);

impl Summary {
    /// Summarize `values`, shifting the location statistics by `offset`.
    ///
    /// Returns `None` when fewer than two values are available: a
    /// one-sample spread is not an estimate.
    #[must_use]
    pub fn of(values: &[f64], sd_kind: SdKind, offset: f64) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }
        let sd = match sd_kind {
            SdKind::Sample => sample_sd(values),
            SdKind::Population => population_sd(values),
        };
        Some(Self {
            mean: mean(values) + offset,
            sd,
            se: standard_error(values),
            lower: percentile(values, INTERVAL.0) + offset,
            upper: percentile(values, INTERVAL.1) + offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_spread() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((population_sd(&v) - 2.0).abs() < 1e-12);
        assert!((sample_sd(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((standard_error(&v) - sample_sd(&v) / 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn percentile_linear_interpolation() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert!((percentile(&v, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&v, 1.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&v, 0.25) - 1.75).abs() < 1e-12);
        // position 0.075 between the first two order statistics
        assert!((percentile(&v, 0.025) - 1.075).abs() < 1e-12);
    }

    #[test]
    fn percentile_degenerate() {
        assert!(percentile(&[], 0.5).is_nan());
        assert!(percentile(&[1.0], 1.5).is_nan());
        assert!((percentile(&[3.0], 0.975) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn summary_requires_two_values() {
        assert!(Summary::of(&[], SdKind::Sample, 0.0).is_none());
        assert!(Summary::of(&[1.0], SdKind::Sample, 0.0).is_none());
        assert!(Summary::of(&[1.0, 3.0], SdKind::Sample, 0.0).is_some());
    }

    #[test]
    fn summary_offset_shifts_location_only() {
        let v = [1.0, 2.0, 3.0];
        let a = Summary::of(&v, SdKind::Population, 0.0).unwrap_or_else(|| unreachable!());
        let b = Summary::of(&v, SdKind::Population, 10.0).unwrap_or_else(|| unreachable!());
        assert!((b.mean - a.mean - 10.0).abs() < 1e-12);
        assert!((b.lower - a.lower - 10.0).abs() < 1e-12);
        assert!((b.upper - a.upper - 10.0).abs() < 1e-12);
        assert!((b.sd - a.sd).abs() < 1e-12);
        assert!((b.se - a.se).abs() < 1e-12);
    }
}
