// SPDX-License-Identifier: AGPL-3.0-or-later
//! Warehouse SQL for fishing hours per spatial bin and risk class.
//!
//! The query chains five steps:
//!
//! 1. `trip_with_risk_class`: the scored trips table;
//! 2. `good_segments`: `good_seg`, enough positions, not
//!    `overlapping_and_short`;
//! 3. `fishing`: positions on good segments, hours counted as fishing
//!    when the neural-net score passes the threshold;
//! 4. `fishing_with_trip`: positions joined to trips by `ssvid` within
//!    `[trip_start, trip_end]`;
//! 5. `fishing_binned`: rounded coordinates, hours summed per
//!    (lat bin, lon bin, risk class).

use crate::trips::RiskKind;
use serde::{Deserialize, Serialize};

/// Parameters of the binning query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinQuery {
    /// Scored trips (output of the at-sea analysis).
    pub trips_table: String,
    pub segments_table: String,
    pub fishing_table: String,
    /// Segments need strictly more positions than this.
    pub min_positions: u32,
    /// Column holding the fishing classifier score.
    pub nnet_column: String,
    /// Hours count as fishing when the score is strictly above this.
    pub nnet_threshold: f64,
    /// Bin side in degrees.
    pub bin_size: f64,
}

impl Default for BinQuery {
    fn default() -> Self {
        Self::for_kind(RiskKind::Iuu)
    }
}

impl BinQuery {
    /// Default query over the scored trips of `kind`.
    #[must_use]
    pub fn for_kind(kind: RiskKind) -> Self {
        Self {
            trips_table: format!("gfwanalysis.GFW_trips.fishing_{kind}"),
            segments_table: "world-fishing-827.gfw_research.pipe_v20200805_segs".into(),
            fishing_table: "world-fishing-827.gfw_research.pipe_v20200805_fishing".into(),
            min_positions: 10,
            nnet_column: "nnet_score2".into(),
            nnet_threshold: 0.5,
            bin_size: 1.0,
        }
    }

    /// Round a coordinate to its bin, as the query does.
    #[must_use]
    pub fn bin(&self, coord: f64) -> f64 {
        if (self.bin_size - 1.0).abs() < f64::EPSILON {
            coord.round()
        } else {
            (coord / self.bin_size).round() * self.bin_size
        }
    }

    fn round_expr(&self, column: &str) -> String {
        if (self.bin_size - 1.0).abs() < f64::EPSILON {
            format!("ROUND({column})")
        } else {
            format!("ROUND({column} / {s}) * {s}", s = self.bin_size)
        }
    }

    /// Standard-SQL text of the query.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "\
#standardSQL

WITH

-- scored trips
trip_with_risk_class AS (
   SELECT *
   FROM `{trips}`
),


-- good segments
good_segments AS (
   SELECT seg_id
   FROM `{segs}`
   WHERE good_seg
      AND positions > {min_positions}
      AND NOT overlapping_and_short
),


-- fishing on good segments
fishing AS (
   SELECT
      ssvid AS x,
      timestamp,
      lat,
      lon,
      IF({nnet} > {threshold}, hours, 0) as fishing_hours
   FROM
      `{fishing}`
   WHERE
      seg_id IN (SELECT seg_id FROM good_segments)
),


-- join positions to trips
fishing_with_trip AS (
   SELECT
      * EXCEPT(x) FROM fishing AS a
   LEFT JOIN (
      SELECT *
      FROM trip_with_risk_class
   ) AS b
   ON a.x = CAST(b.ssvid AS STRING)
   WHERE trip_start <= timestamp
      AND trip_end >= timestamp
),


-- round coordinates
fishing_coord AS (
   SELECT
      {lat_bin} AS lat_bin,
      {lon_bin} AS lon_bin,
      fishing_hours,
      risk_class
   FROM fishing_with_trip
),


-- by risk_class
fishing_binned AS (
   SELECT
      lat_bin,
      lon_bin,
      SUM(fishing_hours) AS fishing_hours,
      risk_class
   FROM fishing_coord
   GROUP BY lat_bin, lon_bin, risk_class
)


SELECT *
FROM fishing_binned
",
            trips = self.trips_table,
            segs = self.segments_table,
            min_positions = self.min_positions,
            nnet = self.nnet_column,
            threshold = self.nnet_threshold,
            fishing = self.fishing_table,
            lat_bin = self.round_expr("lat"),
            lon_bin = self.round_expr("lon"),
        )
    }
}
