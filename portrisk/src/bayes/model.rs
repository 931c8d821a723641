// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical log-normal model of port visits.
//!
//! ```text
//! β_k        ~ Normal(0, 10)            k = 0..4
//! σ_Z        ~ HalfCauchy(5)
//! o_p        ~ Normal(0, 1)             p = ports
//! γ_p        = σ_Z · o_p
//! σ          ~ HalfCauchy(5)
//! y_i        ~ LogNormal(X_i·β + γ_port(i), σ)
//! ```
//!
//! The sampler works on the unconstrained vector
//! `θ = [β_0..β_3, ln σ_Z, o_1..o_P, ln σ]`; the log-density includes
//! the Jacobian of both log transforms. With `r_i = ln y_i − μ_i`:
//!
//! ```text
//! ∂/∂β_k    = −β_k/100 + Σ X_ik r_i / σ²
//! ∂/∂o_p    = −o_p + σ_Z Σ_{i∈p} r_i / σ²
//! ∂/∂ln σ_Z = σ_Z Σ o_port(i) r_i / σ² − 2(σ_Z/5)² / (1 + (σ_Z/5)²) + 1
//! ∂/∂ln σ   = Σ (r_i²/σ² − 1) − 2(σ/5)² / (1 + (σ/5)²) + 1
//! ```
//!
//! Constant terms are dropped.

use crate::error::{Error, Result};
use crate::psma::design::PsmaDesign;

/// Prior sd of the fixed effects.
pub const BETA_PRIOR_SD: f64 = 10.0;
/// Half-Cauchy scale of both standard deviations.
pub const HALF_CAUCHY_SCALE: f64 = 5.0;
/// Number of fixed effects.
pub const N_FIXED: usize = 4;

/// A differentiable log-density on `R^d`.
pub trait LogDensity {
    /// Dimension of the parameter vector.
    fn dim(&self) -> usize;

    /// Log-density at `theta` (up to a constant); writes the gradient
    /// into `grad`.
    fn log_density_grad(&self, theta: &[f64], grad: &mut [f64]) -> f64;
}

/// Constrained parameters of one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub beta: [f64; N_FIXED],
    pub sigma_z: f64,
    pub offsets: Vec<f64>,
    pub sigma: f64,
}

impl Params {
    /// Port intercept `γ_p = σ_Z · o_p`.
    #[must_use]
    pub fn gamma(&self, p: usize) -> f64 {
        self.sigma_z * self.offsets[p]
    }

    /// Linear predictor for fixed-effect row `x` at port `p`.
    #[must_use]
    pub fn mu(&self, x: &[f64; N_FIXED], p: usize) -> f64 {
        x.iter().zip(&self.beta).map(|(a, b)| a * b).sum::<f64>() + self.gamma(p)
    }
}

/// The port-visit model bound to its data.
#[derive(Debug, Clone)]
pub struct PortVisitModel {
    x: Vec<[f64; N_FIXED]>,
    port: Vec<usize>,
    n_ports: usize,
    log_y: Vec<f64>,
}

impl PortVisitModel {
    /// Bind the model to a design.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a response is not positive and
    /// finite or a port index is out of range.
    pub fn new(x: Vec<[f64; N_FIXED]>, port: Vec<usize>, n_ports: usize, y: &[f64]) -> Result<Self> {
        if x.len() != y.len() || port.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "design has {} / {} rows but {} responses",
                x.len(),
                port.len(),
                y.len()
            )));
        }
        if let Some(v) = y.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(Error::InvalidInput(format!("log-normal response must be positive, got {v}")));
        }
        if let Some(p) = port.iter().find(|&&p| p >= n_ports) {
            return Err(Error::InvalidInput(format!("port index {p} >= {n_ports}")));
        }
        Ok(Self {
            x,
            port,
            n_ports,
            log_y: y.iter().map(|v| v.ln()).collect(),
        })
    }

    /// Bind the model to a [`PsmaDesign`].
    ///
    /// # Errors
    ///
    /// See [`PortVisitModel::new`].
    pub fn from_design(design: &PsmaDesign) -> Result<Self> {
        Self::new(design.x.clone(), design.port.clone(), design.n_ports(), &design.y)
    }

    /// Number of ports.
    #[must_use]
    pub const fn n_ports(&self) -> usize {
        self.n_ports
    }

    /// Number of observations.
    #[must_use]
    pub fn n_obs(&self) -> usize {
        self.log_y.len()
    }

    /// Fixed-effect row `i`.
    #[must_use]
    pub fn x_row(&self, i: usize) -> &[f64; N_FIXED] {
        &self.x[i]
    }

    /// Port of row `i`.
    #[must_use]
    pub fn port_of(&self, i: usize) -> usize {
        self.port[i]
    }

    fn sigma_z_index() -> usize {
        N_FIXED
    }

    fn offset_index(p: usize) -> usize {
        N_FIXED + 1 + p
    }

    fn sigma_index(&self) -> usize {
        N_FIXED + 1 + self.n_ports
    }

    /// Map an unconstrained vector to parameters.
    #[must_use]
    pub fn constrain(&self, theta: &[f64]) -> Params {
        let mut beta = [0.0; N_FIXED];
        beta.copy_from_slice(&theta[..N_FIXED]);
        Params {
            beta,
            sigma_z: theta[Self::sigma_z_index()].exp(),
            offsets: theta[Self::offset_index(0)..self.sigma_index()].to_vec(),
            sigma: theta[self.sigma_index()].exp(),
        }
    }

    /// Starting point: intercept at the mean log response, residual scale
    /// at its sd, everything else zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn initial_point(&self) -> Vec<f64> {
        let n = self.log_y.len() as f64;
        let mean = self.log_y.iter().sum::<f64>() / n;
        let var = self.log_y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mut theta = vec![0.0; self.dim()];
        theta[0] = mean;
        theta[self.sigma_index()] = var.sqrt().max(0.1).ln();
        theta
    }

    /// Parameter names of the unconstrained vector.
    #[must_use]
    pub fn unconstrained_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..N_FIXED).map(|k| format!("beta_X[{k}]")).collect();
        names.push("log_sigma_Z".into());
        names.extend((0..self.n_ports).map(|p| format!("gamma_Z_offset[{p}]")));
        names.push("log_sigma".into());
        names
    }
}

fn half_cauchy_log_grad(scale_param: f64) -> (f64, f64) {
    // log p(s) + log |ds/du| for s = e^u, s ~ HalfCauchy(5)
    let z = scale_param / HALF_CAUCHY_SCALE;
    let z2 = z * z;
    (-(z2.ln_1p()) + scale_param.ln(), -2.0 * z2 / (1.0 + z2) + 1.0)
}

impl LogDensity for PortVisitModel {
    fn dim(&self) -> usize {
        N_FIXED + 2 + self.n_ports
    }

    fn log_density_grad(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
        let params = self.constrain(theta);
        let inv_var = 1.0 / (params.sigma * params.sigma);
        let beta_prec = 1.0 / (BETA_PRIOR_SD * BETA_PRIOR_SD);
        grad.fill(0.0);

        let mut lp = 0.0;
        for k in 0..N_FIXED {
            lp -= 0.5 * params.beta[k] * params.beta[k] * beta_prec;
            grad[k] = -params.beta[k] * beta_prec;
        }
        for (p, o) in params.offsets.iter().enumerate() {
            lp -= 0.5 * o * o;
            grad[Self::offset_index(p)] = -o;
        }

        let mut sum_r2 = 0.0;
        let mut d_sigma_z = 0.0;
        for (i, &log_y) in self.log_y.iter().enumerate() {
            let p = self.port[i];
            let r = log_y - params.mu(&self.x[i], p);
            sum_r2 += r * r;
            let w = r * inv_var;
            for k in 0..N_FIXED {
                grad[k] += self.x[i][k] * w;
            }
            grad[Self::offset_index(p)] += params.sigma_z * w;
            d_sigma_z += params.offsets[p] * w;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.log_y.len() as f64;
        lp += -n * params.sigma.ln() - 0.5 * sum_r2 * inv_var;

        let (lp_z, g_z) = half_cauchy_log_grad(params.sigma_z);
        lp += lp_z;
        grad[Self::sigma_z_index()] = params.sigma_z * d_sigma_z + g_z;

        let (lp_s, g_s) = half_cauchy_log_grad(params.sigma);
        lp += lp_s;
        grad[self.sigma_index()] = sum_r2 * inv_var - n + g_s;
        lp
    }
}
