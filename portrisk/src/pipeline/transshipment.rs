// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transshipment trips: trip features from encounters and loitering,
//! model, event-level scores, attribution.
//!
//! Reads `transshipment_trips.csv[.gz]` (encounters) and
//! `transshipment_loitering.csv[.gz]`; writes `transshipment_<k>.csv`
//! (event coordinates with their trip's score and class) plus the
//! importance and effect tables.

use super::{fit_and_attribute, resolve_input, write_attribution};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::io::table::{read_records, write_records};
use crate::trips::transshipment::{
    build_features, event_scores, Encounter, Loitering, ENCOUNTER_COLUMNS, LOITERING_COLUMNS,
};
use crate::trips::RiskKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Encounter table stem.
pub const ENCOUNTERS: &str = "transshipment_trips";
/// Loitering table stem.
pub const LOITERING: &str = "transshipment_loitering";

/// What a run produced.
#[derive(Debug, Clone)]
pub struct TransshipmentReport {
    pub observed: usize,
    pub predicted: usize,
    pub events: usize,
    pub outputs: Vec<PathBuf>,
}

/// Run the transshipment analysis for one risk kind.
///
/// # Errors
///
/// Returns reader errors, [`Error::EmptySubset`] when no trip has an
/// assessed port visit, and model or writer errors.
pub fn run(data_dir: &Path, out_dir: &Path, kind: RiskKind, config: &RunConfig) -> Result<TransshipmentReport> {
    let enc_path = resolve_input(data_dir, ENCOUNTERS)?;
    let loi_path = resolve_input(data_dir, LOITERING)?;
    let encounters: Vec<Encounter> = read_records(&enc_path, &ENCOUNTER_COLUMNS)?;
    let loitering: Vec<Loitering> = read_records(&loi_path, &LOITERING_COLUMNS)?;
    tracing::info!(
        encounters = encounters.len(),
        loitering = loitering.len(),
        "read transshipment events"
    );

    let features = build_features(&encounters, &loitering, kind)?;
    let (observed, unobserved) = features.observed_split();
    if observed.is_empty() {
        return Err(Error::EmptySubset("no transshipment trips with assessed port visits".into()));
    }
    let x_obs = features.subset(&observed)?;
    let x_unobs = features.subset(&unobserved)?;
    let y_obs: Vec<f64> = observed.iter().filter_map(|&i| features.risk_score(i)).collect();

    let fitted = fit_and_attribute(&x_obs, &y_obs, &config.transshipment)?;
    let predicted = fitted.model.predict_batch(x_unobs.rows());

    let mut scores: HashMap<String, f64> = HashMap::with_capacity(features.trip_ids.len());
    for (&i, &s) in observed.iter().zip(&y_obs) {
        scores.insert(features.trip_ids[i].clone(), s);
    }
    for (&i, &s) in unobserved.iter().zip(&predicted) {
        scores.insert(features.trip_ids[i].clone(), s);
    }
    let events = event_scores(&encounters, &loitering, &scores, &config.thresholds)?;

    let prefix = format!("transshipment_{kind}");
    let events_path = out_dir.join(format!("{prefix}.csv"));
    write_records(&events_path, &events)?;
    let (importance, effect) = write_attribution(out_dir, &prefix, &fitted)?;

    Ok(TransshipmentReport {
        observed: observed.len(),
        predicted: unobserved.len(),
        events: events.len(),
        outputs: vec![events_path, importance, effect],
    })
}
