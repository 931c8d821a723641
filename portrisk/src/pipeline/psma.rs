// SPDX-License-Identifier: AGPL-3.0-or-later
//! PSMA before/after model of foreign-vessel port visits.
//!
//! Reads `psma_parties`, `port_visit` and `eez_info` (each `.csv` or
//! `.csv.gz`) and writes, for analysis variable `<v>`:
//!
//! | File | Content |
//! |------|---------|
//! | `psma_<v>_cells.csv` | retained (year, port) cells |
//! | `psma_<v>_summary.csv` | posterior summary with split R̂ |
//! | `psma_<v>_predictive.csv` | long posterior predictive draws |
//! | `psma_<v>_predictive_summary.csv` | predictive summary per cell |
//! | `psma_<v>_relative_change.csv` | per-port relative change |
//! | `psma_<v>.trace` | binary posterior trace |

use super::resolve_input;
use crate::bayes::{self, diagnostics, posterior_predictive, relative_change, PortVisitModel, Trace};
use crate::config::RunConfig;
use crate::error::Result;
use crate::io::table::{read_records, write_records};
use crate::io::trace::write_trace;
use crate::psma::parties::{self, PartyRecord};
use crate::psma::retention::retain_ports;
use crate::psma::sovereign::{self, EezRecord};
use crate::psma::visits::{self, aggregate, filter_visits};
use crate::psma::{AnalysisVariable, PortVisit, PsmaDesign, PsmaParties, SovereignMap};
use std::path::{Path, PathBuf};

/// Party table stem.
pub const PARTIES: &str = "psma_parties";
/// Port-visit table stem.
pub const VISITS: &str = "port_visit";
/// EEZ table stem.
pub const EEZ: &str = "eez_info";

/// What a run produced.
#[derive(Debug, Clone)]
pub struct PsmaReport {
    pub ports: usize,
    pub cells: usize,
    pub max_r_hat: Option<f64>,
    pub divergences: usize,
    pub outputs: Vec<PathBuf>,
}

/// Read the three tables and build the model design for `variable`.
///
/// # Errors
///
/// Returns reader errors, date-parse errors from the party table, and
/// [`crate::Error::EmptySubset`] if filtering or retention leaves nothing.
pub fn prepare(data_dir: &Path, variable: &AnalysisVariable, config: &RunConfig) -> Result<PsmaDesign> {
    let party_rows: Vec<PartyRecord> = read_records(&resolve_input(data_dir, PARTIES)?, &parties::REQUIRED_COLUMNS)?;
    let eez_rows: Vec<EezRecord> = read_records(&resolve_input(data_dir, EEZ)?, &sovereign::REQUIRED_COLUMNS)?;
    let port_visits: Vec<PortVisit> = read_records(&resolve_input(data_dir, VISITS)?, &visits::REQUIRED_COLUMNS)?;

    let parties = PsmaParties::from_records(&party_rows, &config.parties)?;
    let sovereigns = SovereignMap::from_eez(&eez_rows);
    let kept = filter_visits(&port_visits, &parties, &sovereigns, variable);
    let cells = aggregate(&kept, &parties);
    tracing::info!(cells = cells.len(), "aggregated visits per (year, port)");
    let cells = retain_ports(cells, &config.retention)?;
    PsmaDesign::from_cells(cells)
}

/// Sample the posterior for `design` and return the constrained trace.
///
/// # Errors
///
/// Returns model-binding and sampler errors.
pub fn fit(design: &PsmaDesign, config: &RunConfig) -> Result<(Trace, usize)> {
    let model = PortVisitModel::from_design(design)?;
    let chains = bayes::sample(&model, &model.initial_point(), &config.sampler)?;
    let divergences = chains.iter().map(|c| c.divergences).sum();
    Ok((Trace::from_chains(&model, &chains)?, divergences))
}

/// Run the full analysis.
///
/// # Errors
///
/// See [`prepare`] and [`fit`], plus writer errors.
pub fn run(data_dir: &Path, out_dir: &Path, variable: &AnalysisVariable, config: &RunConfig) -> Result<PsmaReport> {
    let design = prepare(data_dir, variable, config)?;
    tracing::info!(
        variable = %variable,
        ports = design.n_ports(),
        rows = design.n_rows(),
        y_max = design.y_max,
        "fitting port-visit model"
    );
    let (trace, divergences) = fit(&design, config)?;

    let summary = diagnostics::summarize(&trace);
    let max_r_hat = diagnostics::max_r_hat(&summary);
    if max_r_hat.is_some_and(|r| r > crate::tolerances::R_HAT_MAX) {
        tracing::warn!(max_r_hat, "chains have not converged");
    }
    let predictive = posterior_predictive(&trace, &design, config.sampler.seed)?;
    let change = relative_change(&trace, &design)?;

    let prefix = format!("psma_{variable}");
    let path = |suffix: &str| out_dir.join(format!("{prefix}{suffix}"));
    let outputs = vec![
        path("_cells.csv"),
        path("_summary.csv"),
        path("_predictive.csv"),
        path("_predictive_summary.csv"),
        path("_relative_change.csv"),
        path(".trace"),
    ];
    write_records(&outputs[0], &design.cells)?;
    write_records(&outputs[1], &summary)?;
    write_records(&outputs[2], predictive.rows(&design))?;
    write_records(&outputs[3], predictive.summarize(&design))?;
    write_records(&outputs[4], &change)?;
    write_trace(&outputs[5], &trace)?;

    Ok(PsmaReport {
        ports: design.n_ports(),
        cells: design.n_rows(),
        max_r_hat,
        divergences,
        outputs,
    })
}
