// SPDX-License-Identifier: AGPL-3.0-or-later
//! Posterior draws on the constrained scale.
//!
//! Values are stored `[chain][draw][param]` in one flat vector, the same
//! order the binary trace file uses.

use super::hmc::ChainOutput;
use super::model::{PortVisitModel, N_FIXED};
use crate::error::{Error, Result};

/// Named draws of every chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    names: Vec<String>,
    n_chains: usize,
    n_draws: usize,
    values: Vec<f64>,
}

impl Trace {
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `values` does not hold exactly
    /// `n_chains × n_draws × names.len()` entries.
    pub fn new(names: Vec<String>, n_chains: usize, n_draws: usize, values: Vec<f64>) -> Result<Self> {
        let expected = n_chains
            .checked_mul(n_draws)
            .and_then(|n| n.checked_mul(names.len()));
        if expected != Some(values.len()) {
            return Err(Error::InvalidInput(format!(
                "{} values for {n_chains} chains × {n_draws} draws × {} params",
                values.len(),
                names.len()
            )));
        }
        Ok(Self {
            names,
            n_chains,
            n_draws,
            values,
        })
    }

    /// Transform sampler output to named constrained parameters:
    /// `beta_X[k]`, `sigma_Z`, `gamma_Z_offset[p]`, `gamma_Z[p]`, `sigma`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for no chains or chains of unequal
    /// length.
    pub fn from_chains(model: &PortVisitModel, chains: &[ChainOutput]) -> Result<Self> {
        let Some(first) = chains.first() else {
            return Err(Error::InvalidInput("no chains to collect".into()));
        };
        let n_draws = first.draws.len();
        if chains.iter().any(|c| c.draws.len() != n_draws) {
            return Err(Error::InvalidInput("chains have different lengths".into()));
        }
        let n_ports = model.n_ports();
        let mut names: Vec<String> = (0..N_FIXED).map(|k| format!("beta_X[{k}]")).collect();
        names.push("sigma_Z".into());
        names.extend((0..n_ports).map(|p| format!("gamma_Z_offset[{p}]")));
        names.extend((0..n_ports).map(|p| format!("gamma_Z[{p}]")));
        names.push("sigma".into());

        let mut values = Vec::with_capacity(chains.len() * n_draws * names.len());
        for chain in chains {
            for theta in &chain.draws {
                let params = model.constrain(theta);
                values.extend_from_slice(&params.beta);
                values.push(params.sigma_z);
                values.extend_from_slice(&params.offsets);
                values.extend((0..n_ports).map(|p| params.gamma(p)));
                values.push(params.sigma);
            }
        }
        Self::new(names, chains.len(), n_draws, values)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn n_params(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub const fn n_chains(&self) -> usize {
        self.n_chains
    }

    #[must_use]
    pub const fn n_draws(&self) -> usize {
        self.n_draws
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column of parameter `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// All parameters of one draw.
    #[must_use]
    pub fn draw(&self, chain: usize, draw: usize) -> &[f64] {
        let start = (chain * self.n_draws + draw) * self.n_params();
        &self.values[start..start + self.n_params()]
    }

    /// Draws of parameter `p`, one vector per chain.
    #[must_use]
    pub fn param_chains(&self, p: usize) -> Vec<Vec<f64>> {
        (0..self.n_chains)
            .map(|c| (0..self.n_draws).map(|d| self.draw(c, d)[p]).collect())
            .collect()
    }

    /// Draws of parameter `p`, chains pooled.
    #[must_use]
    pub fn param_draws(&self, p: usize) -> Vec<f64> {
        self.param_chains(p).into_iter().flatten().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn trace() -> Trace {
        // 2 chains × 3 draws × 2 params
        Trace::new(
            vec!["a".into(), "b".into()],
            2,
            3,
            vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0, 5.0, 50.0, 6.0, 60.0],
        )
        .unwrap()
    }

    #[test]
    fn layout_is_chain_draw_param() {
        let t = trace();
        assert_eq!(t.draw(1, 0), &[4.0, 40.0]);
        assert_eq!(t.param_chains(1), vec![vec![10.0, 20.0, 30.0], vec![40.0, 50.0, 60.0]]);
        assert_eq!(t.param_draws(0), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.index_of("b"), Some(1));
        assert_eq!(t.index_of("c"), None);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Trace::new(vec!["a".into()], 2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn from_chains_names_and_values() {
        let model = PortVisitModel::new(
            vec![[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 1.0, 0.0]],
            vec![0, 1],
            2,
            &[0.5, 1.0],
        )
        .unwrap();
        // θ = [β0..β3, ln σ_Z, o0, o1, ln σ]
        let theta = vec![0.1, 0.2, 0.3, 0.4, 2.0_f64.ln(), 0.5, -1.0, 0.0];
        let chain = ChainOutput {
            draws: vec![theta],
            step_size: 0.1,
            accept_rate: 1.0,
            divergences: 0,
            inv_mass: vec![1.0; 8],
        };
        let t = Trace::from_chains(&model, &[chain]).unwrap();
        assert_eq!(t.n_params(), 4 + 1 + 2 + 2 + 1);
        assert_eq!(t.names()[4], "sigma_Z");
        assert_eq!(t.names()[7], "gamma_Z[0]");
        let d = t.draw(0, 0);
        assert!((d[4] - 2.0).abs() < 1e-12);
        assert!((d[7] - 1.0).abs() < 1e-12);
        assert!((d[8] + 2.0).abs() < 1e-12);
        assert!((d[9] - 1.0).abs() < 1e-12);
    }
}
