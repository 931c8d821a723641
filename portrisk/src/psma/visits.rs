// SPDX-License-Identifier: AGPL-3.0-or-later
//! Foreign-vessel port visits and the analysis variable.
//!
//! The pipeline from raw visits to model cells:
//!
//! 1. drop visits to ports of 2017 parties and rows missing the flag,
//!    port or vessel class;
//! 2. keep foreign visits (flag sovereign ≠ port sovereign);
//! 3. keep the subset selected by the [`AnalysisVariable`];
//! 4. count visits per (year, port), keep 2015 and 2017, keep ports
//!    present in both years.

use super::parties::PsmaParties;
use super::sovereign::SovereignMap;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Columns the visit reader requires.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "year",
    "port_iso3",
    "flag",
    "flag_group",
    "vessel_class",
    "start_timestamp",
];

/// Fishing vessel classes.
pub const FISHING_GEAR: [&str; 10] = [
    "trollers",
    "trawlers",
    "squid_jigger",
    "set_longlines",
    "set_gillnets",
    "purse_seine",
    "pots_and_traps",
    "pole_and_line",
    "driftnets",
    "drifting_longlines",
];

/// Non-fishing classes that can be analysed on their own.
pub const SUPPORT_CLASSES: [&str; 4] = ["bunker", "cargo", "specialized_reefer", "tanker"];

/// Flag groups that can be analysed (among fishing vessels).
pub const FLAG_GROUPS: [&str; 5] = ["group1", "group2", "group3", "china", "other"];

/// Year before the agreement entered into force.
pub const BEFORE_YEAR: i32 = 2015;
/// Year after the agreement entered into force.
pub const AFTER_YEAR: i32 = 2017;

/// One port visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortVisit {
    pub year: i32,
    #[serde(default)]
    pub port_iso3: String,
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub flag_group: String,
    #[serde(default)]
    pub vessel_class: String,
    #[serde(default)]
    pub start_timestamp: String,
}

/// Which visits the model is fit to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisVariable {
    /// A single vessel class (fishing or support).
    VesselClass(String),
    /// All fishing classes.
    FishingGear,
    /// Fishing vessels of one flag group.
    FlagGroup(String),
}

impl FromStr for AnalysisVariable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if FISHING_GEAR.contains(&s) || SUPPORT_CLASSES.contains(&s) {
            Ok(Self::VesselClass(s.to_string()))
        } else if s == "fishing_gear" {
            Ok(Self::FishingGear)
        } else if FLAG_GROUPS.contains(&s) {
            Ok(Self::FlagGroup(s.to_string()))
        } else {
            Err(Error::UnknownVariable(s.to_string()))
        }
    }
}

impl fmt::Display for AnalysisVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VesselClass(c) => f.write_str(c),
            Self::FishingGear => f.write_str("fishing_gear"),
            Self::FlagGroup(g) => f.write_str(g),
        }
    }
}

impl AnalysisVariable {
    /// Whether `visit` belongs to the analysed subset.
    #[must_use]
    pub fn selects(&self, visit: &PortVisit) -> bool {
        let fishing = FISHING_GEAR.contains(&visit.vessel_class.as_str());
        match self {
            Self::VesselClass(c) => visit.vessel_class == *c,
            Self::FishingGear => fishing,
            Self::FlagGroup(g) => fishing && visit.flag_group == *g,
        }
    }
}

/// Visits kept after the port, completeness, foreign-visit and
/// variable filters.
#[must_use]
pub fn filter_visits<'a>(
    visits: &'a [PortVisit],
    parties: &PsmaParties,
    sovereigns: &SovereignMap,
    variable: &AnalysisVariable,
) -> Vec<&'a PortVisit> {
    let kept: Vec<&PortVisit> = visits
        .iter()
        .filter(|v| !parties.in_2017.contains(&v.port_iso3))
        .filter(|v| !v.flag.is_empty() && !v.port_iso3.is_empty() && !v.vessel_class.is_empty())
        .filter(|v| sovereigns.resolve(&v.flag) != sovereigns.resolve(&v.port_iso3))
        .filter(|v| variable.selects(v))
        .collect();
    tracing::info!(
        variable = %variable,
        input = visits.len(),
        kept = kept.len(),
        "filtered port visits"
    );
    kept
}

/// Visit count of one (year, port) cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitCell {
    pub year: i32,
    pub port_iso3: String,
    pub n_visits: u64,
    /// Port is a 2016 party.
    pub psma: bool,
    /// Cell is in the after year.
    pub after: bool,
}

/// Count visits per (year, port) for the before and after years, keeping
/// ports observed in both. Cells are sorted by (year, port).
///
/// Only visits with a start timestamp are counted. A cell whose visits
/// all lack one is kept with a zero count, which retention then drops.
#[must_use]
pub fn aggregate(visits: &[&PortVisit], parties: &PsmaParties) -> Vec<VisitCell> {
    let mut counts: BTreeMap<(i32, &str), u64> = BTreeMap::new();
    for v in visits {
        if v.year == BEFORE_YEAR || v.year == AFTER_YEAR {
            let n = counts.entry((v.year, v.port_iso3.as_str())).or_default();
            *n += u64::from(!v.start_timestamp.trim().is_empty());
        }
    }
    let ports_in = |year: i32| -> BTreeSet<&str> {
        counts.keys().filter(|(y, _)| *y == year).map(|&(_, p)| p).collect()
    };
    let both: BTreeSet<&str> = ports_in(BEFORE_YEAR)
        .intersection(&ports_in(AFTER_YEAR))
        .copied()
        .collect();
    counts
        .iter()
        .filter(|((_, port), _)| both.contains(port))
        .map(|(&(year, port), &n)| VisitCell {
            year,
            port_iso3: port.to_string(),
            n_visits: n,
            psma: parties.is_treated(port),
            after: year == AFTER_YEAR,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::psma::sovereign::EezRecord;

    fn visit(year: i32, port: &str, flag: &str, group: &str, class: &str) -> PortVisit {
        PortVisit {
            year,
            port_iso3: port.into(),
            flag: flag.into(),
            flag_group: group.into(),
            vessel_class: class.into(),
            start_timestamp: format!("{year}-05-01 00:00:00 UTC"),
        }
    }

    fn parties() -> PsmaParties {
        PsmaParties {
            in_2016: ["NOR".to_string()].into_iter().collect(),
            in_2017: ["THA".to_string()].into_iter().collect(),
        }
    }

    fn sovereigns() -> SovereignMap {
        SovereignMap::from_eez(&[EezRecord {
            eez_type: "200NM".into(),
            territory1_iso3: "REU".into(),
            sovereign1_iso3: "FRA".into(),
        }])
    }

    #[test]
    fn parse_variables() {
        assert_eq!(
            "trawlers".parse::<AnalysisVariable>().unwrap(),
            AnalysisVariable::VesselClass("trawlers".into())
        );
        assert_eq!(
            "cargo".parse::<AnalysisVariable>().unwrap(),
            AnalysisVariable::VesselClass("cargo".into())
        );
        assert_eq!(
            "fishing_gear".parse::<AnalysisVariable>().unwrap(),
            AnalysisVariable::FishingGear
        );
        assert_eq!(
            "china".parse::<AnalysisVariable>().unwrap(),
            AnalysisVariable::FlagGroup("china".into())
        );
        assert!(matches!(
            "submarines".parse::<AnalysisVariable>(),
            Err(Error::UnknownVariable(v)) if v == "submarines"
        ));
    }

    #[test]
    fn flag_group_applies_to_fishing_only() {
        let v = AnalysisVariable::FlagGroup("china".into());
        assert!(v.selects(&visit(2015, "NOR", "CHN", "china", "trawlers")));
        assert!(!v.selects(&visit(2015, "NOR", "CHN", "china", "cargo")));
        assert!(!AnalysisVariable::FishingGear.selects(&visit(2015, "NOR", "CHN", "china", "tanker")));
    }

    #[test]
    fn filters_domestic_and_2017_ports() {
        let visits = vec![
            visit(2015, "NOR", "CHN", "china", "trawlers"),
            visit(2015, "REU", "FRA", "other", "trawlers"),
            visit(2015, "THA", "CHN", "china", "trawlers"),
            visit(2015, "", "CHN", "china", "trawlers"),
            visit(2015, "NOR", "NOR", "other", "trawlers"),
        ];
        let kept = filter_visits(&visits, &parties(), &sovereigns(), &AnalysisVariable::FishingGear);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].port_iso3, "NOR");
    }

    #[test]
    fn aggregate_keeps_ports_in_both_years() {
        let visits = vec![
            visit(2015, "NOR", "CHN", "china", "trawlers"),
            visit(2015, "NOR", "CHN", "china", "trawlers"),
            visit(2017, "NOR", "CHN", "china", "trawlers"),
            visit(2016, "NOR", "CHN", "china", "trawlers"),
            visit(2015, "PER", "CHN", "china", "trawlers"),
            visit(2017, "CHL", "CHN", "china", "trawlers"),
        ];
        let refs: Vec<&PortVisit> = visits.iter().collect();
        let cells = aggregate(&refs, &parties());
        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].year, cells[0].n_visits, cells[0].after), (2015, 2, false));
        assert_eq!((cells[1].year, cells[1].n_visits, cells[1].after), (2017, 1, true));
        assert!(cells.iter().all(|c| c.psma));
    }

    #[test]
    fn visits_without_timestamp_are_not_counted() {
        let mut untimed = visit(2015, "ESP", "CHN", "china", "trawlers");
        untimed.start_timestamp = String::new();
        let mut untimed_after = visit(2017, "PER", "CHN", "china", "trawlers");
        untimed_after.start_timestamp = "  ".into();
        let visits = vec![
            visit(2015, "ESP", "CHN", "china", "trawlers"),
            untimed,
            visit(2017, "ESP", "CHN", "china", "trawlers"),
            visit(2015, "PER", "CHN", "china", "trawlers"),
            untimed_after,
        ];
        let refs: Vec<&PortVisit> = visits.iter().collect();
        let cells = aggregate(&refs, &parties());
        let count = |year: i32, port: &str| {
            cells
                .iter()
                .find(|c| c.year == year && c.port_iso3 == port)
                .map(|c| c.n_visits)
        };
        assert_eq!(count(2015, "ESP"), Some(1));
        assert_eq!(count(2017, "ESP"), Some(1));
        assert_eq!(count(2017, "PER"), Some(0));
    }
}
