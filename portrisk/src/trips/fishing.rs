// SPDX-License-Identifier: AGPL-3.0-or-later
//! At-sea fishing trips.
//!
//! One row per trip from the `fishing_trips` export: identifiers, the
//! three categorical predictors, and port-visit counts per risk tier for
//! both assessments. Tier cells may be empty; an empty cell counts as
//! zero visits.

use super::encoding::{DesignMatrix, OneHotEncoder};
use super::risk::{RiskKind, RiskThresholds, TierCounts};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categorical predictors: `(source column, block label)`.
pub const PREDICTORS: [(&str, &str); 3] = [
    ("flag_group", "flag"),
    ("vessel_class", "gear"),
    ("time_at_sea", "tas"),
];

/// Columns the trip reader requires.
pub const REQUIRED_COLUMNS: [&str; 15] = [
    "gfw_trip_id",
    "ssvid",
    "trip_start",
    "trip_end",
    "flag_group",
    "vessel_class",
    "time_at_sea",
    "iuu_no_to",
    "iuu_low_to",
    "iuu_med_to",
    "iuu_high_to",
    "la_no_to",
    "la_low_to",
    "la_med_to",
    "la_high_to",
];

/// One fishing trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishingTrip {
    /// Trip identifier.
    pub gfw_trip_id: String,
    /// Vessel MMSI.
    pub ssvid: String,
    /// Trip start timestamp, passed through unparsed.
    pub trip_start: String,
    /// Trip end timestamp, passed through unparsed.
    pub trip_end: String,
    /// Flag-state group (empty when unknown).
    #[serde(default)]
    pub flag_group: String,
    /// Vessel class (empty when unknown).
    #[serde(default)]
    pub vessel_class: String,
    /// Time-at-sea bucket (empty when unknown).
    #[serde(default)]
    pub time_at_sea: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub iuu_no_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub iuu_low_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub iuu_med_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub iuu_high_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub la_no_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub la_low_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub la_med_to: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub la_high_to: Option<f64>,
}

impl FishingTrip {
    /// Tier counts for `kind`, empty cells as zero.
    #[must_use]
    pub fn tiers(&self, kind: RiskKind) -> TierCounts {
        let (none, low, medium, high) = match kind {
            RiskKind::Iuu => (self.iuu_no_to, self.iuu_low_to, self.iuu_med_to, self.iuu_high_to),
            RiskKind::LaborAbuse => (self.la_no_to, self.la_low_to, self.la_med_to, self.la_high_to),
        };
        TierCounts {
            none: none.unwrap_or(0.0),
            low: low.unwrap_or(0.0),
            medium: medium.unwrap_or(0.0),
            high: high.unwrap_or(0.0),
        }
    }

    /// All three predictors are present.
    #[must_use]
    pub fn has_predictors(&self) -> bool {
        !self.flag_group.is_empty() && !self.vessel_class.is_empty() && !self.time_at_sea.is_empty()
    }

    /// Predictor values in [`PREDICTORS`] order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        vec![
            self.flag_group.as_str(),
            self.vessel_class.as_str(),
            self.time_at_sea.as_str(),
        ]
    }
}

/// Trips partitioned by whether their port visits were assessed.
#[derive(Debug, Clone, Default)]
pub struct TripSplit {
    /// Trips with at least one assessed visit (training set).
    pub observed: Vec<FishingTrip>,
    /// Trips with no assessed visit whose vessel class is among the
    /// observed classes (prediction set).
    pub unobserved: Vec<FishingTrip>,
    /// Trips dropped for a missing predictor.
    pub incomplete: usize,
    /// Unassessed trips dropped because their vessel class never occurs
    /// among observed trips.
    pub unseen_class: usize,
}

/// Drop incomplete trips and split the rest by assessment status.
#[must_use]
pub fn split_trips(trips: Vec<FishingTrip>, kind: RiskKind) -> TripSplit {
    let mut split = TripSplit::default();
    let mut pending = Vec::new();
    for trip in trips {
        if !trip.has_predictors() {
            split.incomplete += 1;
        } else if trip.tiers(kind).is_observed() {
            split.observed.push(trip);
        } else {
            pending.push(trip);
        }
    }
    let classes: BTreeSet<&str> = split.observed.iter().map(|t| t.vessel_class.as_str()).collect();
    let (keep, unseen): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .partition(|t| classes.contains(t.vessel_class.as_str()));
    split.unobserved = keep;
    split.unseen_class = unseen.len();
    tracing::info!(
        kind = %kind,
        observed = split.observed.len(),
        unobserved = split.unobserved.len(),
        incomplete = split.incomplete,
        unseen_class = split.unseen_class,
        "split fishing trips"
    );
    split
}

/// Fit the encoder on the observed trips and encode both subsets.
///
/// Unobserved trips are encoded against the observed columns; a category
/// never seen in training encodes as all-zero within its block.
///
/// # Errors
///
/// Returns [`Error::EmptySubset`] when there are no observed trips.
pub fn encode_split(split: &TripSplit) -> Result<(DesignMatrix, DesignMatrix)> {
    if split.observed.is_empty() {
        return Err(Error::EmptySubset("no fishing trips with assessed port visits".into()));
    }
    let observed: Vec<Vec<&str>> = split.observed.iter().map(FishingTrip::categories).collect();
    let unobserved: Vec<Vec<&str>> = split.unobserved.iter().map(FishingTrip::categories).collect();
    let encoder = OneHotEncoder::fit(&PREDICTORS, &observed)?;
    Ok((encoder.transform(&observed)?, encoder.transform(&unobserved)?))
}

/// Where a trip's score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    /// Derived from the trip's own tier counts.
    Obs,
    /// Predicted by the model.
    Pred,
}

/// Row of `fishing_<k>_pred.csv` / `fishing_<k>_obs.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripScore {
    pub gfw_trip_id: String,
    pub ssvid: String,
    pub trip_start: String,
    pub trip_end: String,
    pub risk_score: f64,
    pub risk_class: u8,
}

/// Row of the combined `fishing_<k>.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTripScore {
    pub gfw_trip_id: String,
    pub ssvid: String,
    pub trip_start: String,
    pub trip_end: String,
    pub risk_score: f64,
    #[serde(rename = "type")]
    pub source: ScoreSource,
    pub risk_class: u8,
}

/// Score rows for `trips` with the given scores.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on a length mismatch or a NaN score.
pub fn score_rows(
    trips: &[FishingTrip],
    scores: &[f64],
    thresholds: &RiskThresholds,
) -> Result<Vec<TripScore>> {
    if trips.len() != scores.len() {
        return Err(Error::InvalidInput(format!(
            "{} trips but {} scores",
            trips.len(),
            scores.len()
        )));
    }
    trips
        .iter()
        .zip(scores)
        .map(|(t, &s)| {
            Ok(TripScore {
                gfw_trip_id: t.gfw_trip_id.clone(),
                ssvid: t.ssvid.clone(),
                trip_start: t.trip_start.clone(),
                trip_end: t.trip_end.clone(),
                risk_score: s,
                risk_class: thresholds.classify(s)?,
            })
        })
        .collect()
}

impl CombinedTripScore {
    /// Tag a scored row with its source.
    #[must_use]
    pub fn from_score(row: TripScore, source: ScoreSource) -> Self {
        Self {
            gfw_trip_id: row.gfw_trip_id,
            ssvid: row.ssvid,
            trip_start: row.trip_start,
            trip_end: row.trip_end,
            risk_score: row.risk_score,
            source,
            risk_class: row.risk_class,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::table::read_records_from;

    const CSV: &str = "\
gfw_trip_id,ssvid,trip_start,trip_end,flag_group,vessel_class,time_at_sea,iuu_no_to,iuu_low_to,iuu_med_to,iuu_high_to,la_no_to,la_low_to,la_med_to,la_high_to
t1,100,2018-01-01,2018-01-20,china,trawlers,long,0,1,0,2,1,0,0,0
t2,101,2018-02-01,2018-02-03,group1,squid_jigger,short,,,,,0,0,0,0
t3,102,2018-03-01,2018-03-09,,trawlers,short,1,0,0,0,0,0,0,0
t4,103,2018-04-01,2018-04-09,group2,trawlers,short,0,0,0,0,0,0,1,0
t5,104,2018-05-01,2018-05-09,group2,purse_seine,short,0,0,0,0,0,0,0,0
";

    fn trips() -> Vec<FishingTrip> {
        read_records_from(CSV.as_bytes(), "fishing_trips", &REQUIRED_COLUMNS).unwrap()
    }

    #[test]
    fn empty_tier_cells_are_zero() {
        let t = trips();
        assert_eq!(t[1].tiers(RiskKind::Iuu), TierCounts::default());
        let iuu = t[0].tiers(RiskKind::Iuu);
        assert!((iuu.risk_score() - (1.0 / 3.0 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn split_by_kind() {
        let split = split_trips(trips(), RiskKind::Iuu);
        assert_eq!(split.incomplete, 1);
        let ids: Vec<&str> = split.observed.iter().map(|t| t.gfw_trip_id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);
        // t4 shares trawlers with t1; t2 and t5 have unseen classes.
        assert_eq!(split.unobserved.len(), 1);
        assert_eq!(split.unseen_class, 2);

        let la = split_trips(trips(), RiskKind::LaborAbuse);
        let ids: Vec<&str> = la.observed.iter().map(|t| t.gfw_trip_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t4"]);
    }

    #[test]
    fn encode_against_observed_columns() {
        let split = split_trips(trips(), RiskKind::LaborAbuse);
        let (obs, unobs) = encode_split(&split).unwrap();
        assert_eq!(
            obs.columns(),
            &[
                "flag_group_china",
                "flag_group_group2",
                "vessel_class_trawlers",
                "time_at_sea_long",
                "time_at_sea_short"
            ]
        );
        assert_eq!(unobs.n_cols(), obs.n_cols());
        assert_eq!(obs.blocks().len(), 3);
    }

    #[test]
    fn no_observed_trips_is_an_error() {
        let split = TripSplit::default();
        assert!(matches!(encode_split(&split), Err(Error::EmptySubset(_))));
    }

    #[test]
    fn combined_rows_carry_type() {
        let t = trips();
        let rows = score_rows(&t[..1], &[2.5], &RiskThresholds::default()).unwrap();
        assert_eq!(rows[0].risk_class, 2);
        let combined = CombinedTripScore::from_score(rows[0].clone(), ScoreSource::Pred);
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(&combined).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert!(text.starts_with("gfw_trip_id,ssvid,trip_start,trip_end,risk_score,type,risk_class"));
        assert!(text.contains(",pred,2"));
    }

    #[test]
    fn score_rows_rejects_mismatch() {
        let t = trips();
        assert!(score_rows(&t, &[1.0], &RiskThresholds::default()).is_err());
    }
}
