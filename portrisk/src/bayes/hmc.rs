// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hamiltonian Monte Carlo with step-size and mass-matrix adaptation.
//!
//! # Algorithm
//!
//! Each iteration draws a momentum `p ~ N(0, M)`, runs `L` leapfrog steps
//! of size `ε` (with `L` drawn uniformly from `1..=⌈λ/ε⌉` to avoid
//! periodic trajectories), and accepts the end point with probability
//! `min(1, exp(−ΔH))`.
//!
//! Warm-up has three phases:
//!
//! 1. the first 15% of tuning iterations adapt `ε` only;
//! 2. up to 75%, draws also feed a running variance that becomes the
//!    diagonal inverse mass matrix, after which `ε` is re-initialised;
//! 3. the remainder adapts `ε` for the new metric.
//!
//! Step size uses dual averaging toward the target acceptance rate; the
//! averaged iterate is frozen when sampling starts. An energy error above
//! 1000 counts as a divergence and the proposal is rejected.
//!
//! # References
//!
//! - Neal, R.M. "MCMC using Hamiltonian dynamics." *Handbook of MCMC*
//!   (2011).
//! - Hoffman, M.D. & Gelman, A. "The No-U-Turn Sampler." *JMLR* 15,
//!   1593–1623 (2014), Algorithms 4 and 5.

use super::model::LogDensity;
use crate::error::{Error, Result};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

const DIVERGENCE_THRESHOLD: f64 = 1000.0;
const DA_GAMMA: f64 = 0.05;
const DA_T0: f64 = 10.0;
const DA_KAPPA: f64 = 0.75;
const FAST_FRACTION: f64 = 0.15;
const SLOW_END_FRACTION: f64 = 0.75;

/// Sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Kept draws per chain.
    pub draws: usize,
    /// Warm-up iterations per chain (discarded).
    pub tune: usize,
    /// Independent chains, run one after another.
    pub chains: usize,
    /// Target mean acceptance probability during warm-up.
    pub target_accept: f64,
    /// Integration time `λ = L·ε`.
    pub trajectory_length: f64,
    /// Cap on leapfrog steps per iteration.
    pub max_leapfrog: usize,
    /// Half-width of the uniform jitter added to the initial point.
    pub init_jitter: f64,
    /// Base seed; chain `c` uses `seed + c`.
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: 5000,
            tune: 2000,
            chains: 2,
            target_accept: 0.9,
            trajectory_length: 2.0,
            max_leapfrog: 512,
            init_jitter: 0.5,
            seed: 0,
        }
    }
}

impl SamplerConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for zero draws or chains, a target
    /// outside `(0, 1)`, a non-positive trajectory length or a negative
    /// jitter.
    pub fn validate(&self) -> Result<()> {
        if self.draws == 0 || self.chains == 0 {
            return Err(Error::InvalidInput("sampler needs at least one draw and one chain".into()));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(Error::InvalidInput(format!(
                "target_accept must be in (0, 1), got {}",
                self.target_accept
            )));
        }
        if !(self.trajectory_length > 0.0) || self.max_leapfrog == 0 {
            return Err(Error::InvalidInput("trajectory length and leapfrog cap must be positive".into()));
        }
        if !(self.init_jitter >= 0.0 && self.init_jitter.is_finite()) {
            return Err(Error::InvalidInput(format!("init_jitter must be >= 0, got {}", self.init_jitter)));
        }
        Ok(())
    }
}

/// Draws and adaptation results of one chain.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Kept draws on the unconstrained space.
    pub draws: Vec<Vec<f64>>,
    /// Final step size.
    pub step_size: f64,
    /// Mean acceptance probability over kept draws.
    pub accept_rate: f64,
    /// Divergent transitions over kept draws.
    pub divergences: usize,
    /// Adapted diagonal inverse mass matrix.
    pub inv_mass: Vec<f64>,
}

/// Dual-averaging state (Hoffman & Gelman Alg. 5).
struct DualAveraging {
    mu: f64,
    h_bar: f64,
    log_eps: f64,
    log_eps_bar: f64,
    m: f64,
    target: f64,
}

impl DualAveraging {
    fn new(eps: f64, target: f64) -> Self {
        Self {
            mu: (10.0 * eps).ln(),
            h_bar: 0.0,
            log_eps: eps.ln(),
            log_eps_bar: 0.0,
            m: 0.0,
            target,
        }
    }

    fn update(&mut self, accept: f64) -> f64 {
        self.m += 1.0;
        let w = 1.0 / (self.m + DA_T0);
        self.h_bar = (1.0 - w).mul_add(self.h_bar, w * (self.target - accept));
        self.log_eps = self.mu - self.m.sqrt() / DA_GAMMA * self.h_bar;
        let eta = self.m.powf(-DA_KAPPA);
        self.log_eps_bar = eta.mul_add(self.log_eps, (1.0 - eta) * self.log_eps_bar);
        self.log_eps.exp()
    }

    fn final_step(&self) -> f64 {
        self.log_eps_bar.exp()
    }
}

/// Welford running variance.
struct RunningVariance {
    n: f64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningVariance {
    fn new(dim: usize) -> Self {
        Self {
            n: 0.0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    fn push(&mut self, x: &[f64]) {
        self.n += 1.0;
        for ((m, s), &v) in self.mean.iter_mut().zip(&mut self.m2).zip(x) {
            let d = v - *m;
            *m += d / self.n;
            *s += d * (v - *m);
        }
    }

    /// Regularized variance (shrunk toward 1e-3, Stan's rule).
    fn regularized(&self) -> Option<Vec<f64>> {
        if self.n < 3.0 {
            return None;
        }
        let shrink = self.n / (self.n + 5.0);
        Some(
            self.m2
                .iter()
                .map(|s| shrink * s / (self.n - 1.0) + 1e-3 * (5.0 / (self.n + 5.0)))
                .collect(),
        )
    }
}

struct Hamiltonian<'a, M: LogDensity> {
    model: &'a M,
    inv_mass: Vec<f64>,
    grad: Vec<f64>,
}

impl<M: LogDensity> Hamiltonian<'_, M> {
    fn kinetic(&self, p: &[f64]) -> f64 {
        0.5 * p.iter().zip(&self.inv_mass).map(|(pi, m)| pi * pi * m).sum::<f64>()
    }

    /// Leapfrog from `(theta, p)`; returns the end point's log-density.
    fn leapfrog(&mut self, theta: &mut [f64], p: &mut [f64], eps: f64, steps: usize) -> f64 {
        let mut lp = self.model.log_density_grad(theta, &mut self.grad);
        for _ in 0..steps {
            for (pi, g) in p.iter_mut().zip(&self.grad) {
                *pi += 0.5 * eps * g;
            }
            for ((t, pi), m) in theta.iter_mut().zip(p.iter()).zip(&self.inv_mass) {
                *t += eps * m * pi;
            }
            lp = self.model.log_density_grad(theta, &mut self.grad);
            if !lp.is_finite() {
                return f64::NEG_INFINITY;
            }
            for (pi, g) in p.iter_mut().zip(&self.grad) {
                *pi += 0.5 * eps * g;
            }
        }
        lp
    }

    fn draw_momentum(&self, rng: &mut StdRng, normal: &Normal) -> Vec<f64> {
        self.inv_mass
            .iter()
            .map(|m| normal.sample(rng) / m.sqrt())
            .collect()
    }

    /// One transition; returns the acceptance probability and whether the
    /// trajectory diverged.
    fn transition(
        &mut self,
        theta: &mut Vec<f64>,
        eps: f64,
        steps: usize,
        rng: &mut StdRng,
        normal: &Normal,
    ) -> (f64, bool) {
        let p0 = self.draw_momentum(rng, normal);
        let lp0 = self.model.log_density_grad(theta, &mut self.grad);
        let h0 = self.kinetic(&p0) - lp0;
        let mut proposal = theta.clone();
        let mut p = p0;
        let lp1 = self.leapfrog(&mut proposal, &mut p, eps, steps);
        let h1 = self.kinetic(&p) - lp1;
        let delta = h1 - h0;
        if !delta.is_finite() || delta > DIVERGENCE_THRESHOLD {
            return (0.0, true);
        }
        let accept = (-delta).exp().min(1.0);
        if rng.gen::<f64>() < accept {
            *theta = proposal;
        }
        (accept, false)
    }

    /// Heuristic initial step size (Hoffman & Gelman Alg. 4).
    fn reasonable_step(&mut self, theta: &[f64], rng: &mut StdRng, normal: &Normal) -> f64 {
        let mut eps = 1.0;
        let p0 = self.draw_momentum(rng, normal);
        let lp0 = self.model.log_density_grad(theta, &mut self.grad);
        let h0 = self.kinetic(&p0) - lp0;
        let log_accept = |me: &mut Self, eps: f64| {
            let mut t = theta.to_vec();
            let mut p = p0.clone();
            let lp = me.leapfrog(&mut t, &mut p, eps, 1);
            let h = me.kinetic(&p) - lp;
            if h.is_finite() { h0 - h } else { f64::NEG_INFINITY }
        };
        let direction = if log_accept(self, eps) > 0.5_f64.ln() { 1.0 } else { -1.0 };
        for _ in 0..100 {
            let la = log_accept(self, eps);
            if direction * la <= -direction * 2.0_f64.ln() {
                break;
            }
            eps *= 2.0_f64.powf(direction);
        }
        eps.clamp(1e-8, 1e3)
    }
}

fn leapfrog_steps(config: &SamplerConfig, eps: f64, rng: &mut StdRng) -> usize {
    let max = (config.trajectory_length / eps).ceil();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max = if max.is_finite() && max >= 1.0 {
        (max as usize).min(config.max_leapfrog)
    } else {
        1
    };
    rng.gen_range(1..=max)
}

/// Run one chain from `init`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an invalid configuration or an
/// initial point with non-finite log-density.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_chain<M: LogDensity>(
    model: &M,
    init: &[f64],
    config: &SamplerConfig,
    seed: u64,
) -> Result<ChainOutput> {
    config.validate()?;
    let dim = model.dim();
    if init.len() != dim {
        return Err(Error::InvalidInput(format!(
            "initial point has {} coordinates, model has {dim}",
            init.len()
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut theta: Vec<f64> = init
        .iter()
        .map(|v| v + rng.gen_range(-config.init_jitter..=config.init_jitter))
        .collect();
    let mut ham = Hamiltonian {
        model,
        inv_mass: vec![1.0; dim],
        grad: vec![0.0; dim],
    };
    if !model.log_density_grad(&theta, &mut ham.grad).is_finite() {
        return Err(Error::InvalidInput("log-density is not finite at the initial point".into()));
    }

    let fast_end = (config.tune as f64 * FAST_FRACTION) as usize;
    let slow_end = (config.tune as f64 * SLOW_END_FRACTION) as usize;
    let mut eps = ham.reasonable_step(&theta, &mut rng, &normal);
    let mut da = DualAveraging::new(eps, config.target_accept);
    let mut var = RunningVariance::new(dim);

    for it in 0..config.tune {
        let steps = leapfrog_steps(config, eps, &mut rng);
        let (accept, _) = ham.transition(&mut theta, eps, steps, &mut rng, &normal);
        eps = da.update(accept);
        if it >= fast_end && it < slow_end {
            var.push(&theta);
        }
        if it + 1 == slow_end {
            if let Some(v) = var.regularized() {
                ham.inv_mass = v;
                eps = ham.reasonable_step(&theta, &mut rng, &normal);
                da = DualAveraging::new(eps, config.target_accept);
            }
        }
    }
    if config.tune > 0 {
        eps = da.final_step();
    }
    tracing::debug!(seed, step_size = eps, "warm-up finished");

    let mut draws = Vec::with_capacity(config.draws);
    let mut accept_sum = 0.0;
    let mut divergences = 0;
    for _ in 0..config.draws {
        let steps = leapfrog_steps(config, eps, &mut rng);
        let (accept, divergent) = ham.transition(&mut theta, eps, steps, &mut rng, &normal);
        accept_sum += accept;
        divergences += usize::from(divergent);
        draws.push(theta.clone());
    }
    let accept_rate = accept_sum / config.draws as f64;
    Ok(ChainOutput {
        draws,
        step_size: eps,
        accept_rate,
        divergences,
        inv_mass: ham.inv_mass,
    })
}

/// Run `config.chains` chains sequentially, chain `c` seeded with
/// `config.seed + c`.
///
/// # Errors
///
/// Propagates [`sample_chain`] errors.
pub fn sample<M: LogDensity>(model: &M, init: &[f64], config: &SamplerConfig) -> Result<Vec<ChainOutput>> {
    (0..config.chains)
        .map(|c| {
            let seed = config.seed.wrapping_add(c as u64);
            let out = sample_chain(model, init, config, seed)?;
            tracing::info!(
                chain = c,
                draws = out.draws.len(),
                step_size = out.step_size,
                accept_rate = out.accept_rate,
                divergences = out.divergences,
                "chain finished"
            );
            if out.divergences > 0 {
                tracing::warn!(chain = c, divergences = out.divergences, "divergent transitions");
            }
            Ok(out)
        })
        .collect()
}
