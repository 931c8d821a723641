// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fishing hours per spatial bin and risk class.

pub mod area;
pub mod query;
pub mod runner;

pub use area::{bin_area_km2, EARTH_RADIUS_M};
pub use query::BinQuery;
pub use runner::{BinnedHours, LocalRunner, QueryRunner};

use serde::{Deserialize, Serialize};

/// Output row: binned hours with the bin's area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRow {
    pub lat_bin: f64,
    pub lon_bin: f64,
    pub fishing_hours: f64,
    pub risk_class: u8,
    pub km2: f64,
}

/// Attach the geodesic area of every bin.
#[must_use]
pub fn with_area(rows: Vec<BinnedHours>, bin_size: f64) -> Vec<BinRow> {
    rows.into_iter()
        .map(|r| BinRow {
            km2: bin_area_km2(r.lat_bin, bin_size),
            lat_bin: r.lat_bin,
            lon_bin: r.lon_bin,
            fishing_hours: r.fishing_hours,
            risk_class: r.risk_class,
        })
        .collect()
}
