// SPDX-License-Identifier: AGPL-3.0-or-later
//! Port-inspection risk tiers, the derived risk score, and risk classes.
//!
//! A trip's port visits are assessed into four tiers (none / low /
//! medium / high). The score weights them `1/3, 2/3, 1` and subtracts
//! the no-risk count, so trips that only visit low-risk ports score
//! negative. Classes cut the score at fixed thresholds.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which assessment the tier counts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskKind {
    /// Illegal, unreported and unregulated fishing.
    Iuu,
    /// Labor abuse.
    #[serde(rename = "la")]
    LaborAbuse,
}

impl RiskKind {
    /// Short tag used in column and file names (`iuu`, `la`).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Iuu => "iuu",
            Self::LaborAbuse => "la",
        }
    }
}

impl fmt::Display for RiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RiskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "iuu" => Ok(Self::Iuu),
            "la" | "labor" | "labor_abuse" => Ok(Self::LaborAbuse),
            other => Err(Error::InvalidInput(format!("unknown risk kind '{other}'"))),
        }
    }
}

/// Port visits per risk tier for one trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Visits to ports assessed as no risk.
    pub none: f64,
    /// Visits to low-risk ports.
    pub low: f64,
    /// Visits to medium-risk ports.
    pub medium: f64,
    /// Visits to high-risk ports.
    pub high: f64,
}

impl TierCounts {
    /// Total assessed visits.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.none + self.low + self.medium + self.high
    }

    /// Whether the trip has any assessed port visit.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.total() > 0.0
    }

    /// `low/3 + 2·medium/3 + high − none`.
    #[must_use]
    pub fn risk_score(&self) -> f64 {
        (2.0 / 3.0_f64).mul_add(self.medium, self.low / 3.0) + self.high - self.none
    }
}

/// Class cut points; `score < lower → 0`, `score < upper → 1`, else `2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Lower cut.
    pub lower: f64,
    /// Upper cut.
    pub upper: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 2.0,
        }
    }
}

impl RiskThresholds {
    /// Build validated thresholds (`lower < upper`, both finite).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the cuts are not finite or
    /// not strictly increasing.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(Error::InvalidInput(format!(
                "risk thresholds must be finite and increasing, got [{lower}, {upper})"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Discretize a score into class 0, 1 or 2.
    ///
    /// Total over all non-NaN scores, including infinities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a NaN score.
    ///
    /// ```
    /// use portrisk::trips::risk::RiskThresholds;
    ///
    /// let t = RiskThresholds::default();
    /// let classes: Vec<u8> = [-1.0, 0.0, 1.9, 2.0, 5.0]
    ///     .iter()
    ///     .map(|&s| t.classify(s).unwrap())
    ///     .collect();
    /// assert_eq!(classes, vec![0, 1, 1, 2, 2]);
    /// ```
    pub fn classify(&self, score: f64) -> Result<u8> {
        if score.is_nan() {
            return Err(Error::InvalidInput("risk score is NaN".into()));
        }
        Ok(if score < self.lower {
            0
        } else if score < self.upper {
            1
        } else {
            2
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn score_weights() {
        let t = TierCounts {
            none: 1.0,
            low: 3.0,
            medium: 3.0,
            high: 2.0,
        };
        // 1 + 2 + 2 - 1
        assert!((t.risk_score() - 4.0).abs() < 1e-12);
        assert!((t.total() - 9.0).abs() < 1e-12);
        assert!(t.is_observed());
    }

    #[test]
    fn unobserved_trip() {
        let t = TierCounts::default();
        assert!(!t.is_observed());
        assert!(t.risk_score().abs() < 1e-12);
    }

    #[test]
    fn classify_documented_example() {
        let t = RiskThresholds::default();
        let got: Vec<u8> = [-1.0, 0.0, 1.9, 2.0, 5.0]
            .iter()
            .map(|&s| t.classify(s).unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 1, 2, 2]);
    }

    #[test]
    fn classify_boundaries_and_infinities() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(-f64::MIN_POSITIVE).unwrap(), 0);
        assert_eq!(t.classify(-0.0).unwrap(), 1);
        assert_eq!(t.classify(2.0 - f64::EPSILON).unwrap(), 1);
        assert_eq!(t.classify(f64::NEG_INFINITY).unwrap(), 0);
        assert_eq!(t.classify(f64::INFINITY).unwrap(), 2);
        assert!(t.classify(f64::NAN).is_err());
    }

    #[test]
    fn thresholds_validated() {
        assert!(RiskThresholds::new(2.0, 0.0).is_err());
        assert!(RiskThresholds::new(0.0, 0.0).is_err());
        assert!(RiskThresholds::new(f64::NAN, 1.0).is_err());
        assert!(RiskThresholds::new(-1.0, 1.0).is_ok());
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("IUU".parse::<RiskKind>().unwrap(), RiskKind::Iuu);
        assert_eq!("la".parse::<RiskKind>().unwrap(), RiskKind::LaborAbuse);
        assert!("fish".parse::<RiskKind>().is_err());
        assert_eq!(RiskKind::LaborAbuse.to_string(), "la");
    }
}
