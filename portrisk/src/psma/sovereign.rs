// SPDX-License-Identifier: AGPL-3.0-or-later
//! Territory → sovereign mapping.
//!
//! A visit by a French-flagged vessel to a port in Réunion is domestic.
//! Flags and ports are both mapped to their sovereign before the
//! foreign-visit filter. Pairs come from the 200 NM rows of the EEZ
//! table whose territory differs from its sovereign, plus a few
//! territories the EEZ table does not list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Columns the EEZ reader requires.
pub const REQUIRED_COLUMNS: [&str; 3] = ["eez_type", "territory1_iso3", "sovereign1_iso3"];

/// Territories missing from the EEZ table.
pub const EXTRA_PAIRS: [(&str, &str); 4] = [
    ("MAC", "CHN"),
    ("HKG", "CHN"),
    ("MYT", "FRA"),
    ("ALA", "FIN"),
];

/// One row of the EEZ table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EezRecord {
    pub eez_type: String,
    #[serde(default)]
    pub territory1_iso3: String,
    #[serde(default)]
    pub sovereign1_iso3: String,
}

/// Lookup from territory ISO3 to sovereign ISO3.
#[derive(Debug, Clone, Default)]
pub struct SovereignMap {
    map: HashMap<String, String>,
}

impl SovereignMap {
    /// Build from EEZ rows plus [`EXTRA_PAIRS`].
    ///
    /// When a territory appears with several sovereigns the last pair
    /// wins, so [`EXTRA_PAIRS`] override the table.
    #[must_use]
    pub fn from_eez(records: &[EezRecord]) -> Self {
        let mut map = HashMap::new();
        let pairs = records
            .iter()
            .filter(|r| r.eez_type == "200NM")
            .filter(|r| !r.territory1_iso3.is_empty() && !r.sovereign1_iso3.is_empty())
            .filter(|r| r.territory1_iso3 != r.sovereign1_iso3)
            .map(|r| (r.territory1_iso3.as_str(), r.sovereign1_iso3.as_str()))
            .chain(EXTRA_PAIRS);
        for (territory, sovereign) in pairs {
            map.insert(territory.to_string(), sovereign.to_string());
        }
        tracing::debug!(pairs = map.len(), "territory to sovereign map");
        Self { map }
    }

    /// Sovereign of `iso3`, or `iso3` itself when it is not a territory.
    #[must_use]
    pub fn resolve<'a>(&'a self, iso3: &'a str) -> &'a str {
        self.map.get(iso3).map_or(iso3, String::as_str)
    }

    /// Number of territory pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eez(kind: &str, t: &str, s: &str) -> EezRecord {
        EezRecord {
            eez_type: kind.into(),
            territory1_iso3: t.into(),
            sovereign1_iso3: s.into(),
        }
    }

    #[test]
    fn maps_territories_only() {
        let m = SovereignMap::from_eez(&[
            eez("200NM", "REU", "FRA"),
            eez("200NM", "FRA", "FRA"),
            eez("Joint regime", "XYZ", "ABC"),
            eez("200NM", "GRL", "DNK"),
        ]);
        assert_eq!(m.resolve("REU"), "FRA");
        assert_eq!(m.resolve("GRL"), "DNK");
        assert_eq!(m.resolve("XYZ"), "XYZ");
        assert_eq!(m.resolve("HKG"), "CHN");
        assert_eq!(m.resolve("ALA"), "FIN");
        assert_eq!(m.len(), 2 + EXTRA_PAIRS.len());
    }

    #[test]
    fn extra_pairs_override_table() {
        let m = SovereignMap::from_eez(&[eez("200NM", "MAC", "PRT")]);
        assert_eq!(m.resolve("MAC"), "CHN");
    }
}
