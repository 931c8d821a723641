// SPDX-License-Identifier: AGPL-3.0-or-later
//! Posterior summaries and the split-R̂ convergence diagnostic.
//!
//! Split R̂ (Gelman et al., *Bayesian Data Analysis*, 3rd ed., §11.4)
//! halves every chain, then compares between- and within-half variance:
//!
//! ```text
//! W  = mean of within-half variances
//! B  = n · var(half means)
//! R̂ = sqrt(((n − 1)/n · W + B/n) / W)
//! ```

use super::trace::Trace;
use crate::stats::{self, SdKind, Summary};
use serde::{Deserialize, Serialize};

/// Split R̂ over per-chain draws. `None` if a half has fewer than two
/// draws or the within variance is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn split_r_hat(chains: &[Vec<f64>]) -> Option<f64> {
    let half = chains.iter().map(Vec::len).min()? / 2;
    if half < 2 {
        return None;
    }
    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| [&c[..half], &c[half..2 * half]])
        .collect();
    let n = half as f64;
    let means: Vec<f64> = halves.iter().map(|h| stats::mean(h)).collect();
    let w = halves.iter().map(|h| stats::sample_sd(h).powi(2)).sum::<f64>() / halves.len() as f64;
    let b = n * stats::sample_sd(&means).powi(2);
    if !(w > 0.0) {
        return None;
    }
    let var_plus = (n - 1.0) / n * w + b / n;
    Some((var_plus / w).sqrt())
}

/// One row of the posterior summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSummary {
    pub parameter: String,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    #[serde(rename = "q2.5")]
    pub lower: Option<f64>,
    #[serde(rename = "q97.5")]
    pub upper: Option<f64>,
    pub r_hat: Option<f64>,
}

/// Summarize every parameter of a trace, chains pooled.
#[must_use]
pub fn summarize(trace: &Trace) -> Vec<ParamSummary> {
    trace
        .names()
        .iter()
        .enumerate()
        .map(|(p, name)| {
            let summary = Summary::of(&trace.param_draws(p), SdKind::Sample, 0.0);
            ParamSummary {
                parameter: name.clone(),
                mean: summary.map(|s| s.mean),
                sd: summary.map(|s| s.sd),
                lower: summary.map(|s| s.lower),
                upper: summary.map(|s| s.upper),
                r_hat: split_r_hat(&trace.param_chains(p)),
            }
        })
        .collect()
}

/// Largest R̂ among parameters that have one.
#[must_use]
pub fn max_r_hat(rows: &[ParamSummary]) -> Option<f64> {
    rows.iter().filter_map(|r| r.r_hat).reduce(f64::max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(seed: u64, n: usize, shift: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen::<f64>() + shift).collect()
    }

    #[test]
    fn mixed_chains_near_one() {
        let r = split_r_hat(&[noise(1, 1000, 0.0), noise(2, 1000, 0.0)]).unwrap();
        assert!((r - 1.0).abs() < 0.02, "r_hat {r}");
    }

    #[test]
    fn separated_chains_flagged() {
        let r = split_r_hat(&[noise(1, 1000, 0.0), noise(2, 1000, 5.0)]).unwrap();
        assert!(r > 1.5, "r_hat {r}");
    }

    #[test]
    fn trending_single_chain_flagged() {
        let chain: Vec<f64> = (0..1000).map(|i| i as f64 / 100.0).collect();
        assert!(split_r_hat(&[chain]).unwrap() > 1.5);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(split_r_hat(&[]).is_none());
        assert!(split_r_hat(&[vec![1.0, 2.0, 3.0]]).is_none());
        assert!(split_r_hat(&[vec![1.0; 10]]).is_none());
    }

    #[test]
    fn summary_rows() {
        let t = Trace::new(
            vec!["a".into()],
            2,
            4,
            vec![1.0, 2.0, 3.0, 4.0, 1.5, 2.5, 3.5, 4.5],
        )
        .unwrap();
        let rows = summarize(&t);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parameter, "a");
        assert!((rows[0].mean.unwrap() - 2.75).abs() < 1e-12);
        assert!(rows[0].r_hat.is_some());
        assert_eq!(max_r_hat(&rows), rows[0].r_hat);
    }
}
