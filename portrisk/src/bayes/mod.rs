// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bayesian inference for the port-visit model.
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | hierarchical log-normal log-density and gradient |
//! | [`hmc`] | adaptive Hamiltonian Monte Carlo |
//! | [`trace`] | named constrained draws |
//! | [`diagnostics`] | posterior summary and split R̂ |
//! | [`predictive`] | posterior predictive and relative change |

pub mod diagnostics;
pub mod hmc;
pub mod model;
pub mod predictive;
pub mod trace;

pub use diagnostics::{summarize, ParamSummary};
pub use hmc::{sample, ChainOutput, SamplerConfig};
pub use model::{LogDensity, PortVisitModel};
pub use predictive::{posterior_predictive, relative_change};
pub use trace::Trace;
