// SPDX-License-Identifier: AGPL-3.0-or-later
//! At-sea fishing trips: score, predict, attribute.
//!
//! Reads `fishing_trips.csv[.gz]` and writes, for risk kind `<k>`:
//!
//! | File | Rows |
//! |------|------|
//! | `fishing_<k>_pred.csv` | observed trips, in-sample predicted score |
//! | `fishing_<k>_obs.csv` | observed trips, observed score |
//! | `fishing_<k>.csv` | predicted unobserved trips, then observed trips |
//! | `fishing_<k>_importance.csv` | block-pair importance |
//! | `fishing_<k>_effect.csv` | conditional effects |

use super::{fit_and_attribute, resolve_input, write_attribution};
use crate::config::RunConfig;
use crate::error::Result;
use crate::io::table::{read_records, write_records};
use crate::trips::fishing::{
    encode_split, score_rows, split_trips, CombinedTripScore, FishingTrip, ScoreSource, REQUIRED_COLUMNS,
};
use crate::trips::RiskKind;
use std::path::{Path, PathBuf};

/// Input table stem.
pub const INPUT: &str = "fishing_trips";

/// What a run produced.
#[derive(Debug, Clone)]
pub struct AtSeaReport {
    pub observed: usize,
    pub predicted: usize,
    pub outputs: Vec<PathBuf>,
}

/// Run the at-sea analysis for one risk kind.
///
/// # Errors
///
/// Returns I/O, CSV and missing-column errors from the reader,
/// [`crate::Error::EmptySubset`] when no trip has an assessed port visit,
/// and model or writer errors.
pub fn run(data_dir: &Path, out_dir: &Path, kind: RiskKind, config: &RunConfig) -> Result<AtSeaReport> {
    let input = resolve_input(data_dir, INPUT)?;
    let trips: Vec<FishingTrip> = read_records(&input, &REQUIRED_COLUMNS)?;
    tracing::info!(path = %input.display(), rows = trips.len(), "read fishing trips");

    let split = split_trips(trips, kind);
    let (x_obs, x_unobs) = encode_split(&split)?;
    let y_obs: Vec<f64> = split.observed.iter().map(|t| t.tiers(kind).risk_score()).collect();

    let fitted = fit_and_attribute(&x_obs, &y_obs, &config.fishing)?;
    let predicted = fitted.model.predict_batch(x_unobs.rows());
    let thresholds = &config.thresholds;

    let prefix = format!("fishing_{kind}");
    let pred_rows = score_rows(&split.observed, &fitted.fitted, thresholds)?;
    let obs_rows = score_rows(&split.observed, &y_obs, thresholds)?;
    let unobs_rows = score_rows(&split.unobserved, &predicted, thresholds)?;

    let pred_path = out_dir.join(format!("{prefix}_pred.csv"));
    let obs_path = out_dir.join(format!("{prefix}_obs.csv"));
    let combined_path = out_dir.join(format!("{prefix}.csv"));
    write_records(&pred_path, &pred_rows)?;
    write_records(&obs_path, &obs_rows)?;
    let combined = unobs_rows
        .into_iter()
        .map(|r| CombinedTripScore::from_score(r, ScoreSource::Pred))
        .chain(obs_rows.into_iter().map(|r| CombinedTripScore::from_score(r, ScoreSource::Obs)));
    write_records(&combined_path, combined)?;
    let (importance, effect) = write_attribution(out_dir, &prefix, &fitted)?;

    Ok(AtSeaReport {
        observed: split.observed.len(),
        predicted: split.unobserved.len(),
        outputs: vec![pred_path, obs_path, combined_path, importance, effect],
    })
}
