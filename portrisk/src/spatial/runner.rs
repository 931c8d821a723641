// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution of the binning query.
//!
//! [`QueryRunner`] is the seam between the composed SQL and whatever runs
//! it. [`LocalRunner`] performs the same aggregation over CSV exports of
//! the three source tables, so the job runs without warehouse access.

use super::query::BinQuery;
use crate::error::{Error, Result};
use crate::io::table::{self, open_reader, require_columns, table_name};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Fishing hours of one (lat bin, lon bin, risk class) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedHours {
    pub lat_bin: f64,
    pub lon_bin: f64,
    pub fishing_hours: f64,
    pub risk_class: u8,
}

/// Runs a [`BinQuery`].
pub trait QueryRunner {
    /// Execute the query and return the binned rows.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the local runner reports I/O, CSV and
    /// parse failures.
    fn run(&self, query: &BinQuery) -> Result<Vec<BinnedHours>>;
}

/// Columns of the scored-trips export the runner needs.
pub const TRIP_COLUMNS: [&str; 4] = ["ssvid", "trip_start", "trip_end", "risk_class"];
/// Columns of the segments export.
pub const SEGMENT_COLUMNS: [&str; 4] = ["seg_id", "good_seg", "positions", "overlapping_and_short"];
/// Columns of the fishing-positions export, besides the classifier score.
pub const POSITION_COLUMNS: [&str; 6] = ["ssvid", "seg_id", "timestamp", "lat", "lon", "hours"];

#[derive(Debug, Deserialize)]
struct TripWindow {
    ssvid: String,
    trip_start: String,
    trip_end: String,
    risk_class: u8,
}

/// Runs the aggregation over local CSV (or `.csv.gz`) exports.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    pub trips: PathBuf,
    pub segments: PathBuf,
    pub positions: PathBuf,
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f UTC",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Parse the warehouse's timestamp spellings (RFC 3339, `… UTC`, naive)
/// as UTC.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if no format matches.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.naive_utc());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(Error::InvalidInput(format!("unrecognised timestamp '{s}'")))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Column lookup over a CSV header.
struct Header {
    table: String,
    index: HashMap<String, usize>,
}

impl Header {
    fn new(path: &Path, headers: &csv::StringRecord, required: &[&str]) -> Result<Self> {
        let table = table_name(path);
        require_columns(&table, headers, required)?;
        let index = headers.iter().enumerate().map(|(i, h)| (h.to_string(), i)).collect();
        Ok(Self { table, index })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        self.index
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }

    fn number(&self, record: &csv::StringRecord, column: &str) -> Result<f64> {
        let raw = self.get(record, column);
        raw.trim().parse().map_err(|_| {
            Error::InvalidInput(format!("{}: '{raw}' in column {column} is not a number", self.table))
        })
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<Box<dyn std::io::BufRead>>> {
    Ok(csv::ReaderBuilder::new().has_headers(true).from_reader(open_reader(path)?))
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> Error + '_ {
    move |source| Error::Csv {
        path: path.to_path_buf(),
        source,
    }
}

impl LocalRunner {
    /// Runner over the three exports.
    #[must_use]
    pub fn new(trips: PathBuf, segments: PathBuf, positions: PathBuf) -> Self {
        Self {
            trips,
            segments,
            positions,
        }
    }

    fn good_segments(&self, query: &BinQuery) -> Result<BTreeSet<String>> {
        let mut rdr = csv_reader(&self.segments)?;
        let header = Header::new(&self.segments, rdr.headers().map_err(csv_err(&self.segments))?, &SEGMENT_COLUMNS)?;
        let mut good = BTreeSet::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err(&self.segments))?;
            let good_seg = parse_flag(header.get(&record, "good_seg")).unwrap_or(false);
            let short = parse_flag(header.get(&record, "overlapping_and_short")).unwrap_or(false);
            let positions = header.number(&record, "positions")?;
            if good_seg && !short && positions > f64::from(query.min_positions) {
                good.insert(header.get(&record, "seg_id").to_string());
            }
        }
        Ok(good)
    }

    fn trip_windows(&self) -> Result<HashMap<String, Vec<(NaiveDateTime, NaiveDateTime, u8)>>> {
        let trips: Vec<TripWindow> = table::read_records(&self.trips, &TRIP_COLUMNS)?;
        let mut by_vessel: HashMap<String, Vec<_>> = HashMap::new();
        for t in trips {
            let window = (parse_timestamp(&t.trip_start)?, parse_timestamp(&t.trip_end)?, t.risk_class);
            by_vessel.entry(t.ssvid).or_default().push(window);
        }
        Ok(by_vessel)
    }
}

impl QueryRunner for LocalRunner {
    fn run(&self, query: &BinQuery) -> Result<Vec<BinnedHours>> {
        let good = self.good_segments(query)?;
        let windows = self.trip_windows()?;
        tracing::info!(
            good_segments = good.len(),
            vessels = windows.len(),
            "loaded segments and trip windows"
        );

        let mut required: Vec<&str> = POSITION_COLUMNS.to_vec();
        required.push(&query.nnet_column);
        let mut rdr = csv_reader(&self.positions)?;
        let header = Header::new(&self.positions, rdr.headers().map_err(csv_err(&self.positions))?, &required)?;

        // keyed by bin index so float bins group exactly
        let mut bins: BTreeMap<(i64, i64, u8), f64> = BTreeMap::new();
        let mut matched = 0usize;
        for record in rdr.records() {
            let record = record.map_err(csv_err(&self.positions))?;
            if !good.contains(header.get(&record, "seg_id")) {
                continue;
            }
            let Some(trips) = windows.get(header.get(&record, "ssvid")) else {
                continue;
            };
            let ts = parse_timestamp(header.get(&record, "timestamp"))?;
            let score = header.number(&record, &query.nnet_column).unwrap_or(f64::NAN);
            let hours = if score > query.nnet_threshold {
                header.number(&record, "hours")?
            } else {
                0.0
            };
            let lat = header.number(&record, "lat")?;
            let lon = header.number(&record, "lon")?;
            #[allow(clippy::cast_possible_truncation)]
            let key = |coord: f64| (query.bin(coord) / query.bin_size).round() as i64;
            for &(start, end, class) in trips {
                if start <= ts && ts <= end {
                    *bins.entry((key(lat), key(lon), class)).or_default() += hours;
                    matched += 1;
                }
            }
        }
        tracing::info!(matched, bins = bins.len(), "binned fishing positions");

        #[allow(clippy::cast_precision_loss)]
        let rows = bins
            .into_iter()
            .map(|((lat, lon, risk_class), fishing_hours)| BinnedHours {
                lat_bin: lat as f64 * query.bin_size,
                lon_bin: lon as f64 * query.bin_size,
                fishing_hours,
                risk_class,
            })
            .collect();
        Ok(rows)
    }
}
