// SPDX-License-Identifier: AGPL-3.0-or-later
//! Posterior predictive draws and the per-port treaty effect.
//!
//! For every posterior draw and design row a replicate response is drawn
//! from `LogNormal(X_i·β + γ_port(i), σ)`; values are reported both on the
//! model's scale (`y / max y`) and in visits.
//!
//! The relative change of port `p` compares the observed after-year
//! response with the counterfactual mean the model gives the same cell
//! without the `psma·after` term:
//!
//! ```text
//! cf_p     = exp(β0 + β1·psma_p + β2 + γ_p)
//! change_p = (y_after,p − cf_p) / cf_p
//! ```

use super::model::N_FIXED;
use super::trace::Trace;
use crate::error::{Error, Result};
use crate::psma::design::PsmaDesign;
use crate::stats::{SdKind, Summary};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::LogNormal;

/// Trace columns the predictive step reads.
struct Columns {
    beta: [usize; N_FIXED],
    gamma: Vec<usize>,
    sigma: usize,
}

impl Columns {
    fn resolve(trace: &Trace, n_ports: usize) -> Result<Self> {
        let find = |name: String| {
            trace
                .index_of(&name)
                .ok_or_else(|| Error::TraceFormat(format!("trace has no parameter '{name}'")))
        };
        let mut beta = [0; N_FIXED];
        for (k, b) in beta.iter_mut().enumerate() {
            *b = find(format!("beta_X[{k}]"))?;
        }
        let gamma = (0..n_ports)
            .map(|p| find(format!("gamma_Z[{p}]")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            beta,
            gamma,
            sigma: find("sigma".into())?,
        })
    }

    fn mu(&self, draw: &[f64], x: &[f64; N_FIXED], port: usize) -> f64 {
        self.beta
            .iter()
            .zip(x)
            .map(|(&b, xi)| draw[b] * xi)
            .sum::<f64>()
            + draw[self.gamma[port]]
    }
}

/// Replicate responses, stored `[chain][draw][cell]`.
#[derive(Debug, Clone)]
pub struct PredictiveDraws {
    n_chains: usize,
    n_draws: usize,
    n_cells: usize,
    values: Vec<f64>,
}

/// One row of the long predictive table.
#[derive(Debug, Clone, Serialize)]
pub struct PredictiveRow<'a> {
    pub chain: usize,
    pub draw: usize,
    pub cell: usize,
    pub port_iso3: &'a str,
    pub year: i32,
    pub value: f64,
    pub visits: f64,
}

/// Predictive summary of one design cell, in visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub cell: usize,
    pub port_iso3: String,
    pub year: i32,
    pub observed: u64,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    #[serde(rename = "q2.5")]
    pub lower: Option<f64>,
    #[serde(rename = "q97.5")]
    pub upper: Option<f64>,
}

/// Relative change of one port's after-year visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeChange {
    pub port_iso3: String,
    pub psma: bool,
    pub observed_after: u64,
    /// Posterior mean of the counterfactual, in visits.
    pub counterfactual: Option<f64>,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    #[serde(rename = "q2.5")]
    pub lower: Option<f64>,
    #[serde(rename = "q97.5")]
    pub upper: Option<f64>,
}

fn check_ports(trace: &Trace, design: &PsmaDesign) -> Result<Columns> {
    if trace.n_chains() == 0 || trace.n_draws() == 0 {
        return Err(Error::EmptySubset("trace has no draws".into()));
    }
    Columns::resolve(trace, design.n_ports())
}

/// Draw one replicate per posterior draw and design row.
///
/// # Errors
///
/// Returns [`Error::TraceFormat`] if the trace lacks a model parameter,
/// [`Error::EmptySubset`] for an empty trace, or
/// [`Error::InvalidInput`] if a draw has a non-positive `σ`.
pub fn posterior_predictive(trace: &Trace, design: &PsmaDesign, seed: u64) -> Result<PredictiveDraws> {
    let cols = check_ports(trace, design)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let n_cells = design.n_rows();
    let mut values = Vec::with_capacity(trace.n_chains() * trace.n_draws() * n_cells);
    for c in 0..trace.n_chains() {
        for d in 0..trace.n_draws() {
            let draw = trace.draw(c, d);
            let sigma = draw[cols.sigma];
            for i in 0..n_cells {
                let mu = cols.mu(draw, &design.x[i], design.port[i]);
                let dist = LogNormal::new(mu, sigma)
                    .map_err(|e| Error::InvalidInput(format!("predictive draw ({c}, {d}): {e}")))?;
                values.push(dist.sample(&mut rng));
            }
        }
    }
    tracing::info!(
        chains = trace.n_chains(),
        draws = trace.n_draws(),
        cells = n_cells,
        "drew posterior predictive"
    );
    Ok(PredictiveDraws {
        n_chains: trace.n_chains(),
        n_draws: trace.n_draws(),
        n_cells,
        values,
    })
}

impl PredictiveDraws {
    /// Scaled replicate of `cell` in draw `(chain, draw)`.
    #[must_use]
    pub fn get(&self, chain: usize, draw: usize, cell: usize) -> f64 {
        self.values[(chain * self.n_draws + draw) * self.n_cells + cell]
    }

    #[must_use]
    pub const fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Pooled scaled replicates of one cell.
    #[must_use]
    pub fn cell_draws(&self, cell: usize) -> Vec<f64> {
        (0..self.n_chains)
            .flat_map(|c| (0..self.n_draws).map(move |d| (c, d)))
            .map(|(c, d)| self.get(c, d, cell))
            .collect()
    }

    /// Long-format rows, chain-major.
    pub fn rows<'a>(&'a self, design: &'a PsmaDesign) -> impl Iterator<Item = PredictiveRow<'a>> + 'a {
        (0..self.n_chains).flat_map(move |chain| {
            (0..self.n_draws).flat_map(move |draw| {
                (0..self.n_cells).map(move |cell| {
                    let value = self.get(chain, draw, cell);
                    let src = &design.cells[cell];
                    PredictiveRow {
                        chain,
                        draw,
                        cell,
                        port_iso3: &src.port_iso3,
                        year: src.year,
                        value,
                        visits: value * design.y_max,
                    }
                })
            })
        })
    }

    /// Per-cell summary in visits.
    #[must_use]
    pub fn summarize(&self, design: &PsmaDesign) -> Vec<CellSummary> {
        (0..self.n_cells)
            .map(|cell| {
                let visits: Vec<f64> = self.cell_draws(cell).iter().map(|v| v * design.y_max).collect();
                let s = Summary::of(&visits, SdKind::Sample, 0.0);
                let src = &design.cells[cell];
                CellSummary {
                    cell,
                    port_iso3: src.port_iso3.clone(),
                    year: src.year,
                    observed: src.n_visits,
                    mean: s.map(|s| s.mean),
                    sd: s.map(|s| s.sd),
                    lower: s.map(|s| s.lower),
                    upper: s.map(|s| s.upper),
                }
            })
            .collect()
    }
}

/// Per-port relative change of after-year visits against the
/// no-interaction counterfactual, ports in design order.
///
/// # Errors
///
/// Returns [`Error::TraceFormat`] if the trace lacks a model parameter or
/// [`Error::EmptySubset`] for an empty trace.
pub fn relative_change(trace: &Trace, design: &PsmaDesign) -> Result<Vec<RelativeChange>> {
    let cols = check_ports(trace, design)?;
    let mut rows = Vec::with_capacity(design.n_ports());
    for (p, port) in design.ports.iter().enumerate() {
        let Some(i) = (0..design.n_rows()).find(|&i| design.port[i] == p && design.cells[i].after) else {
            continue;
        };
        let observed = design.y[i];
        let x_cf = [1.0, design.x[i][1], 1.0, 0.0];
        let mut cf = Vec::with_capacity(trace.n_chains() * trace.n_draws());
        for c in 0..trace.n_chains() {
            for d in 0..trace.n_draws() {
                cf.push(cols.mu(trace.draw(c, d), &x_cf, p).exp());
            }
        }
        let change: Vec<f64> = cf.iter().map(|v| (observed - v) / v).collect();
        let s = Summary::of(&change, SdKind::Sample, 0.0);
        let cf_mean = Summary::of(&cf, SdKind::Sample, 0.0).map(|s| s.mean * design.y_max);
        rows.push(RelativeChange {
            port_iso3: port.clone(),
            psma: design.cells[i].psma,
            observed_after: design.cells[i].n_visits,
            counterfactual: cf_mean,
            mean: s.map(|s| s.mean),
            sd: s.map(|s| s.sd),
            lower: s.map(|s| s.lower),
            upper: s.map(|s| s.upper),
        });
    }
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::psma::visits::VisitCell;

    fn design() -> PsmaDesign {
        let cell = |port: &str, year: i32, n: u64, psma: bool| VisitCell {
            year,
            port_iso3: port.into(),
            n_visits: n,
            psma,
            after: year == 2017,
        };
        PsmaDesign::from_cells(vec![
            cell("CHL", 2015, 40, false),
            cell("NOR", 2015, 20, true),
            cell("CHL", 2017, 30, false),
            cell("NOR", 2017, 10, true),
        ])
        .unwrap()
    }

    /// Constant trace: β = [ln 0.5, 0, 0, ln 0.5], γ = 0, σ = `sigma`.
    fn trace(sigma: f64, draws: usize) -> Trace {
        let names: Vec<String> = [
            "beta_X[0]",
            "beta_X[1]",
            "beta_X[2]",
            "beta_X[3]",
            "sigma_Z",
            "gamma_Z[0]",
            "gamma_Z[1]",
            "sigma",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        let one = [0.5_f64.ln(), 0.0, 0.0, 0.5_f64.ln(), 1.0, 0.0, 0.0, sigma];
        let values = one.iter().copied().cycle().take(one.len() * draws * 2).collect();
        Trace::new(names, 2, draws, values).unwrap()
    }

    #[test]
    fn predictive_centres_on_model_mean() {
        let d = design();
        let pp = posterior_predictive(&trace(0.01, 200), &d, 5).unwrap();
        assert_eq!(pp.n_cells(), 4);
        let summary = pp.summarize(&d);
        // CHL 2015: exp(ln 0.5) · 40 = 20 visits
        assert!((summary[0].mean.unwrap() - 20.0).abs() < 0.5);
        // NOR 2017: exp(2 ln 0.5) · 40 = 10 visits
        assert!((summary[3].mean.unwrap() - 10.0).abs() < 0.5);
        assert_eq!(summary[3].observed, 10);
        assert_eq!(pp.rows(&d).count(), 2 * 200 * 4);
    }

    #[test]
    fn same_seed_same_replicates() {
        let d = design();
        let a = posterior_predictive(&trace(0.3, 10), &d, 9).unwrap();
        let b = posterior_predictive(&trace(0.3, 10), &d, 9).unwrap();
        for (x, y) in a.rows(&d).zip(b.rows(&d)) {
            assert_eq!(x.value.to_bits(), y.value.to_bits());
        }
    }

    #[test]
    fn relative_change_against_counterfactual() {
        let d = design();
        let rows = relative_change(&trace(0.1, 5), &d).unwrap();
        assert_eq!(rows.len(), 2);
        // CHL: observed 30/40 = 0.75, cf 0.5 → +50%
        assert_eq!(rows[0].port_iso3, "CHL");
        assert!((rows[0].mean.unwrap() - 0.5).abs() < 1e-9);
        assert!((rows[0].counterfactual.unwrap() - 20.0).abs() < 1e-9);
        // NOR: observed 10/40 = 0.25, cf 0.5 → −50%
        assert!(rows[1].psma);
        assert!((rows[1].mean.unwrap() + 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_parameter_is_format_error() {
        let t = Trace::new(vec!["a".into()], 1, 2, vec![0.0, 0.0]).unwrap();
        assert!(matches!(
            posterior_predictive(&t, &design(), 0),
            Err(Error::TraceFormat(_))
        ));
    }
}
