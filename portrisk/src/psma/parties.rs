// SPDX-License-Identifier: AGPL-3.0-or-later
//! PSMA parties by entry-into-force year.
//!
//! The party table lists each country with its ISO3 code and the date
//! the agreement entered into force for it. Two sets matter: parties
//! in force during 2016 (treated ports) and parties that joined in 2017
//! (excluded, since their ports switch status inside the after period).
//! Both lists get manual adjustments for the Danish realm: Denmark's
//! ratification applied to Denmark from 2016 but to Greenland and the
//! Faroe Islands only from 2017.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Columns the party reader requires.
pub const REQUIRED_COLUMNS: [&str; 3] = ["country", "iso3", "entry_into_force_date"];

/// One row of the PSMA party table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    /// Country name as published.
    pub country: String,
    /// ISO3 code (empty for supranational rows).
    #[serde(default)]
    pub iso3: String,
    /// Entry-into-force date; empty for signatories without ratification.
    #[serde(default)]
    pub entry_into_force_date: String,
}

/// Manual edits applied after the year split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyAdjustments {
    /// Added to the 2016 parties.
    pub add_2016: Vec<String>,
    /// Removed from the 2017 parties.
    pub remove_2017: Vec<String>,
    /// Added to the 2017 parties.
    pub add_2017: Vec<String>,
    /// Rows with this country name are skipped.
    pub exclude_country: String,
}

impl Default for PartyAdjustments {
    fn default() -> Self {
        Self {
            add_2016: vec!["DNK".into()],
            remove_2017: vec!["DNK".into()],
            add_2017: vec!["GRL".into(), "FRO".into()],
            exclude_country: "European Union".into(),
        }
    }
}

/// Parse a party-table date: ISO `2016-06-05`, US `6/5/2016`, or
/// `5 June 2016`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when no format matches.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    ["%Y-%m-%d", "%m/%d/%Y", "%d %B %Y", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| Error::InvalidInput(format!("unrecognised entry-into-force date '{text}'")))
}

/// Party sets used by the port-visit model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsmaParties {
    /// Ports treated as PSMA ports.
    pub in_2016: BTreeSet<String>,
    /// Ports removed from the analysis.
    pub in_2017: BTreeSet<String>,
}

impl PsmaParties {
    /// Split parties by entry-into-force year and apply `adjust`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unparseable date.
    pub fn from_records(records: &[PartyRecord], adjust: &PartyAdjustments) -> Result<Self> {
        let mut parties = Self::default();
        for r in records {
            if r.country == adjust.exclude_country || r.entry_into_force_date.trim().is_empty() {
                continue;
            }
            if r.iso3.is_empty() {
                tracing::warn!(country = %r.country, "party without ISO3 code skipped");
                continue;
            }
            match parse_date(&r.entry_into_force_date)?.year() {
                2016 => {
                    parties.in_2016.insert(r.iso3.clone());
                }
                2017 => {
                    parties.in_2017.insert(r.iso3.clone());
                }
                _ => {}
            }
        }
        parties.in_2016.extend(adjust.add_2016.iter().cloned());
        for iso3 in &adjust.remove_2017 {
            parties.in_2017.remove(iso3);
        }
        parties.in_2017.extend(adjust.add_2017.iter().cloned());
        tracing::info!(
            in_2016 = parties.in_2016.len(),
            in_2017 = parties.in_2017.len(),
            "PSMA parties"
        );
        Ok(parties)
    }

    /// Whether `port_iso3` had the agreement in force throughout the
    /// after period.
    #[must_use]
    pub fn is_treated(&self, port_iso3: &str) -> bool {
        self.in_2016.contains(port_iso3)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rec(country: &str, iso3: &str, date: &str) -> PartyRecord {
        PartyRecord {
            country: country.into(),
            iso3: iso3.into(),
            entry_into_force_date: date.into(),
        }
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2016, 6, 5).unwrap();
        assert_eq!(parse_date("2016-06-05").unwrap(), d);
        assert_eq!(parse_date("6/5/2016").unwrap(), d);
        assert_eq!(parse_date("5 June 2016").unwrap(), d);
        assert!(parse_date("sometime").is_err());
    }

    #[test]
    fn year_split_with_danish_realm() {
        let records = vec![
            rec("Norway", "NOR", "2016-06-05"),
            rec("Denmark", "DNK", "2017-03-01"),
            rec("Thailand", "THA", "2017-01-01"),
            rec("European Union", "", "2016-06-05"),
            rec("Chile", "CHL", "2016-06-05"),
            rec("Signatory", "XXX", ""),
            rec("Late", "LAT", "2019-01-01"),
        ];
        let p = PsmaParties::from_records(&records, &PartyAdjustments::default()).unwrap();
        let in_2016: Vec<&str> = p.in_2016.iter().map(String::as_str).collect();
        assert_eq!(in_2016, vec!["CHL", "DNK", "NOR"]);
        let in_2017: Vec<&str> = p.in_2017.iter().map(String::as_str).collect();
        assert_eq!(in_2017, vec!["FRO", "GRL", "THA"]);
        assert!(p.is_treated("DNK"));
        assert!(!p.is_treated("THA"));
    }

    #[test]
    fn bad_date_is_an_error() {
        let records = vec![rec("Nowhere", "NWH", "31/31/2016")];
        assert!(PsmaParties::from_records(&records, &PartyAdjustments::default()).is_err());
    }
}
