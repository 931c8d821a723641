// SPDX-License-Identifier: AGPL-3.0-or-later
//! Carrier trips with encounters and loitering events.
//!
//! The encounter export has one row per (carrier trip, encounter): the
//! carrier's flag group and time-at-sea bucket repeat on every row, the
//! encountered vessel's flag group and class vary. The loitering export
//! has one row per loitering event. Features are built per trip:
//!
//! | block       | columns                      | exclusive |
//! |-------------|------------------------------|-----------|
//! | `is_tas`    | `time_at_sea_<bucket>`       | yes       |
//! | `is_flag`   | `carrier_<flag group>`       | yes       |
//! | `with_flag` | `with_<neighbor flag group>` | no        |
//! | `with_gear` | `with_<neighbor class>`      | no        |
//! | `loitering` | `loitering`, `no_loitering`  | yes       |
//!
//! The `with_*` columns are multi-hot: a trip meets any number of
//! vessels.

use super::encoding::{DesignMatrix, FeatureBlock};
use super::risk::{RiskKind, RiskThresholds, TierCounts};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Columns the encounter reader requires.
pub const ENCOUNTER_COLUMNS: [&str; 15] = [
    "gfw_trip_id",
    "carrier_flag_group",
    "neighbor_flag_group",
    "neighbor_vessel_class",
    "time_at_sea",
    "to_iuu_no",
    "to_iuu_low",
    "to_iuu_med",
    "to_iuu_high",
    "to_la_no",
    "to_la_low",
    "to_la_med",
    "to_la_high",
    "lon_mean",
    "lat_mean",
];

/// Columns the loitering reader requires.
pub const LOITERING_COLUMNS: [&str; 3] = ["gfw_trip_id", "lon_mean", "lat_mean"];

/// One encounter of a carrier trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub gfw_trip_id: String,
    #[serde(default)]
    pub carrier_flag_group: String,
    #[serde(default)]
    pub neighbor_flag_group: String,
    #[serde(default)]
    pub neighbor_vessel_class: String,
    #[serde(default)]
    pub time_at_sea: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_iuu_no: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_iuu_low: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_iuu_med: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_iuu_high: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_la_no: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_la_low: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_la_med: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to_la_high: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lon_mean: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lat_mean: Option<f64>,
}

impl Encounter {
    /// All four predictors are present.
    #[must_use]
    pub fn has_predictors(&self) -> bool {
        [
            &self.carrier_flag_group,
            &self.neighbor_flag_group,
            &self.neighbor_vessel_class,
            &self.time_at_sea,
        ]
        .iter()
        .all(|s| !s.is_empty())
    }

    /// Tier counts of the carrier trip for `kind`; `None` unless all four
    /// tiers are present.
    #[must_use]
    pub fn tiers(&self, kind: RiskKind) -> Option<TierCounts> {
        let (none, low, medium, high) = match kind {
            RiskKind::Iuu => (self.to_iuu_no, self.to_iuu_low, self.to_iuu_med, self.to_iuu_high),
            RiskKind::LaborAbuse => (self.to_la_no, self.to_la_low, self.to_la_med, self.to_la_high),
        };
        Some(TierCounts {
            none: none?,
            low: low?,
            medium: medium?,
            high: high?,
        })
    }
}

/// One loitering event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loitering {
    pub gfw_trip_id: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lon_mean: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lat_mean: Option<f64>,
}

/// Per-trip design and targets.
#[derive(Debug, Clone)]
pub struct TripFeatures {
    /// Trip ids, sorted; row `i` of `design` is `trip_ids[i]`.
    pub trip_ids: Vec<String>,
    /// Trip-level design matrix.
    pub design: DesignMatrix,
    /// Tier counts of each trip (from its first encounter row), `None`
    /// when any tier is missing.
    pub tiers: Vec<Option<TierCounts>>,
}

impl TripFeatures {
    /// Row indices of trips with and without assessed port visits. A trip
    /// with any missing tier is unobserved.
    #[must_use]
    pub fn observed_split(&self) -> (Vec<usize>, Vec<usize>) {
        (0..self.trip_ids.len()).partition(|&i| self.tiers[i].is_some_and(|t| t.is_observed()))
    }

    /// Observed risk score of trip `i`, if all its tiers are present.
    #[must_use]
    pub fn risk_score(&self, i: usize) -> Option<f64> {
        self.tiers[i].map(|t| t.risk_score())
    }

    /// Design restricted to `rows`, keeping columns and blocks.
    ///
    /// # Errors
    ///
    /// Propagates [`DesignMatrix::new`] validation errors.
    pub fn subset(&self, rows: &[usize]) -> Result<DesignMatrix> {
        DesignMatrix::new(
            self.design.columns().to_vec(),
            self.design.blocks().to_vec(),
            rows.iter().map(|&i| self.design.row(i).to_vec()).collect(),
        )
    }
}

#[derive(Default)]
struct TripAcc<'a> {
    first: Option<&'a Encounter>,
    with_flags: BTreeSet<&'a str>,
    with_classes: BTreeSet<&'a str>,
}

/// Build trip-level features from encounters and loitering events.
///
/// Encounter rows with a missing predictor are ignored. A trip's own
/// attributes come from its first remaining encounter row.
///
/// # Errors
///
/// Returns [`Error::EmptySubset`] if no encounter row has all
/// predictors.
pub fn build_features(
    encounters: &[Encounter],
    loitering: &[Loitering],
    kind: RiskKind,
) -> Result<TripFeatures> {
    let mut trips: BTreeMap<&str, TripAcc<'_>> = BTreeMap::new();
    let mut skipped = 0usize;
    for e in encounters {
        if !e.has_predictors() {
            skipped += 1;
            continue;
        }
        let acc = trips.entry(e.gfw_trip_id.as_str()).or_default();
        acc.first.get_or_insert(e);
        acc.with_flags.insert(e.neighbor_flag_group.as_str());
        acc.with_classes.insert(e.neighbor_vessel_class.as_str());
    }
    if trips.is_empty() {
        return Err(Error::EmptySubset("no encounter rows with complete predictors".into()));
    }
    let loitering_trips: BTreeSet<&str> = loitering.iter().map(|l| l.gfw_trip_id.as_str()).collect();

    let firsts: Vec<&Encounter> = trips.values().filter_map(|a| a.first).collect();
    let tas: BTreeSet<&str> = firsts.iter().map(|e| e.time_at_sea.as_str()).collect();
    let flags: BTreeSet<&str> = firsts.iter().map(|e| e.carrier_flag_group.as_str()).collect();
    let with_flags: BTreeSet<&str> = trips.values().flat_map(|a| a.with_flags.iter().copied()).collect();
    let with_classes: BTreeSet<&str> =
        trips.values().flat_map(|a| a.with_classes.iter().copied()).collect();

    let mut columns = Vec::new();
    let mut blocks = Vec::new();
    let mut push_block = |name: &str, names: Vec<String>, exclusive: bool| {
        let start = columns.len();
        columns.extend(names);
        blocks.push(FeatureBlock::new(name, start..columns.len(), exclusive));
        start
    };
    let tas_at = push_block("is_tas", tas.iter().map(|t| format!("time_at_sea_{t}")).collect(), true);
    let flag_at = push_block("is_flag", flags.iter().map(|f| format!("carrier_{f}")).collect(), true);
    let with_flag_at = push_block("with_flag", with_flags.iter().map(|f| format!("with_{f}")).collect(), false);
    let with_gear_at =
        push_block("with_gear", with_classes.iter().map(|c| format!("with_{c}")).collect(), false);
    let loiter_at = push_block("loitering", vec!["loitering".into(), "no_loitering".into()], true);

    let index = |set: &BTreeSet<&str>, value: &str| set.iter().position(|v| *v == value);
    let mut rows = Vec::with_capacity(trips.len());
    let mut tiers = Vec::with_capacity(trips.len());
    let mut trip_ids = Vec::with_capacity(trips.len());
    for (id, acc) in &trips {
        let Some(first) = acc.first else { continue };
        let mut row = vec![0.0; columns.len()];
        if let Some(k) = index(&tas, &first.time_at_sea) {
            row[tas_at + k] = 1.0;
        }
        if let Some(k) = index(&flags, &first.carrier_flag_group) {
            row[flag_at + k] = 1.0;
        }
        for f in &acc.with_flags {
            if let Some(k) = index(&with_flags, f) {
                row[with_flag_at + k] = 1.0;
            }
        }
        for c in &acc.with_classes {
            if let Some(k) = index(&with_classes, c) {
                row[with_gear_at + k] = 1.0;
            }
        }
        let loitered = loitering_trips.contains(id);
        row[loiter_at + usize::from(!loitered)] = 1.0;
        rows.push(row);
        tiers.push(first.tiers(kind));
        trip_ids.push((*id).to_string());
    }
    tracing::info!(
        trips = trip_ids.len(),
        skipped_rows = skipped,
        columns = columns.len(),
        "built transshipment trip features"
    );
    Ok(TripFeatures {
        trip_ids,
        design: DesignMatrix::new(columns, blocks, rows)?,
        tiers,
    })
}

/// Row of `transshipment_<k>.csv`: one event location with its trip's
/// score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventScore {
    pub lon_mean: f64,
    pub lat_mean: f64,
    pub risk_score: f64,
    pub risk_class: u8,
}

/// Attach trip scores to every encounter, then every loitering event.
///
/// Events of trips without a score or without coordinates are dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a NaN score.
pub fn event_scores(
    encounters: &[Encounter],
    loitering: &[Loitering],
    scores: &HashMap<String, f64>,
    thresholds: &RiskThresholds,
) -> Result<Vec<EventScore>> {
    let located = encounters
        .iter()
        .map(|e| (&e.gfw_trip_id, e.lon_mean, e.lat_mean))
        .chain(loitering.iter().map(|l| (&l.gfw_trip_id, l.lon_mean, l.lat_mean)));
    let mut out = Vec::new();
    for (id, lon, lat) in located {
        let (Some(&score), Some(lon_mean), Some(lat_mean)) = (scores.get(id), lon, lat) else {
            continue;
        };
        out.push(EventScore {
            lon_mean,
            lat_mean,
            risk_score: score,
            risk_class: thresholds.classify(score)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::table::read_records_from;

    const ENCOUNTERS: &str = "\
gfw_trip_id,carrier_flag_group,neighbor_flag_group,neighbor_vessel_class,time_at_sea,to_iuu_no,to_iuu_low,to_iuu_med,to_iuu_high,to_la_no,to_la_low,to_la_med,to_la_high,lon_mean,lat_mean
c1,china,group1,squid_jigger,long,0,0,1,1,0,0,0,0,10.0,-5.0
c1,china,china,trawlers,long,0,0,1,1,0,0,0,0,11.0,-5.5
c2,group2,group1,trawlers,short,1,0,0,0,0,1,0,0,20.0,3.0
c3,group2,,trawlers,short,0,0,0,0,0,0,0,0,30.0,4.0
c4,other,china,squid_jigger,short,,,,,,,,,,
c5,group1,group2,trawlers,long,,0,0,1,0,1,0,0,40.0,5.0
";
    const LOITERING: &str = "gfw_trip_id,lon_mean,lat_mean\nc2,21.0,3.1\nc2,22.0,3.2\nc9,0.0,0.0\n";

    fn inputs() -> (Vec<Encounter>, Vec<Loitering>) {
        (
            read_records_from(ENCOUNTERS.as_bytes(), "transshipment_trips", &ENCOUNTER_COLUMNS).unwrap(),
            read_records_from(LOITERING.as_bytes(), "transshipment_loitering", &LOITERING_COLUMNS)
                .unwrap(),
        )
    }

    #[test]
    fn trip_rows_and_blocks() {
        let (enc, loit) = inputs();
        let f = build_features(&enc, &loit, RiskKind::Iuu).unwrap();
        // c3 has no neighbor flag and is dropped.
        assert_eq!(f.trip_ids, vec!["c1", "c2", "c4", "c5"]);
        let names: Vec<&str> = f.design.blocks().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["is_tas", "is_flag", "with_flag", "with_gear", "loitering"]);
        let excl: Vec<bool> = f.design.blocks().iter().map(|b| b.exclusive).collect();
        assert_eq!(excl, vec![true, true, false, false, true]);
    }

    #[test]
    fn with_columns_are_multi_hot() {
        let (enc, loit) = inputs();
        let f = build_features(&enc, &loit, RiskKind::Iuu).unwrap();
        let x = &f.design;
        let col = |n: &str| x.column_index(n).unwrap();
        assert!(x.is_active(0, col("with_group1")));
        assert!(x.is_active(0, col("with_china")));
        assert!(x.is_active(0, col("with_squid_jigger")));
        assert!(x.is_active(0, col("with_trawlers")));
        assert!(x.is_active(0, col("no_loitering")));
        assert!(x.is_active(1, col("loitering")));
        assert!(!x.is_active(1, col("no_loitering")));
    }

    #[test]
    fn observed_split_uses_kind() {
        let (enc, loit) = inputs();
        let iuu = build_features(&enc, &loit, RiskKind::Iuu).unwrap();
        assert_eq!(iuu.observed_split(), (vec![0, 1], vec![2, 3]));
        let la = build_features(&enc, &loit, RiskKind::LaborAbuse).unwrap();
        assert_eq!(la.observed_split(), (vec![1, 3], vec![0, 2]));
        assert_eq!(iuu.subset(&[1]).unwrap().n_rows(), 1);
    }

    #[test]
    fn events_get_trip_scores() {
        let (enc, loit) = inputs();
        let scores: HashMap<String, f64> =
            [("c1".to_string(), 2.5), ("c2".to_string(), -1.0)].into_iter().collect();
        let events = event_scores(&enc, &loit, &scores, &RiskThresholds::default()).unwrap();
        // two c1 encounters, one c2 encounter, two c2 loitering events
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].risk_class, 2);
        assert_eq!(events[4].risk_class, 0);
        assert!((events[4].lon_mean - 22.0).abs() < 1e-12);
    }

    #[test]
    fn missing_tier_is_not_observed() {
        let (enc, loit) = inputs();
        // c5 has iuu high = 1 but an empty iuu none cell
        let c5 = enc.iter().find(|e| e.gfw_trip_id == "c5").unwrap();
        assert_eq!(c5.tiers(RiskKind::Iuu), None);
        assert!(c5.tiers(RiskKind::LaborAbuse).is_some());
        let f = build_features(&enc, &loit, RiskKind::Iuu).unwrap();
        assert_eq!(f.risk_score(3), None);
        assert!(!f.observed_split().0.contains(&3));
        assert!((f.risk_score(0).unwrap() - (2.0 / 3.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn all_incomplete_is_an_error() {
        let (enc, loit) = inputs();
        assert!(build_features(&enc[3..4], &loit, RiskKind::Iuu).is_err());
    }
}
