// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fishing hours per spatial bin and risk class.
//!
//! Always writes the warehouse SQL to `fishing_bin_<k>.sql`. With local
//! exports present (`fishing_<k>`, `segments`, `fishing_positions`) it
//! also runs the aggregation and writes `fishing_bin_<k>.csv` with the
//! area of every bin.

use super::resolve_input;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::io::table::write_records;
use crate::spatial::{with_area, BinQuery, LocalRunner, QueryRunner};
use crate::trips::RiskKind;
use std::path::{Path, PathBuf};

/// Segments export stem.
pub const SEGMENTS: &str = "segments";
/// Fishing-positions export stem.
pub const POSITIONS: &str = "fishing_positions";

/// Write the query text for `kind` and return its path.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_sql(out_dir: &Path, kind: RiskKind, query: &BinQuery) -> Result<PathBuf> {
    let path = out_dir.join(format!("fishing_bin_{kind}.sql"));
    std::fs::create_dir_all(out_dir).map_err(|e| Error::Io {
        path: out_dir.to_path_buf(),
        source: e,
    })?;
    std::fs::write(&path, query.render()).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "wrote binning query");
    Ok(path)
}

/// The query for `kind`: the configured one with its trips table pointed
/// at the scored trips of `kind` when it still names the default table.
#[must_use]
pub fn query_for(kind: RiskKind, config: &RunConfig) -> BinQuery {
    let mut query = config.bins.clone();
    if query.trips_table == BinQuery::default().trips_table {
        query.trips_table = BinQuery::for_kind(kind).trips_table;
    }
    query
}

/// Local runner over the exports in `data_dir`.
///
/// # Errors
///
/// Returns [`Error::Io`] (not found) if an export is missing.
pub fn local_runner(data_dir: &Path, kind: RiskKind) -> Result<LocalRunner> {
    Ok(LocalRunner::new(
        resolve_input(data_dir, &format!("fishing_{kind}"))?,
        resolve_input(data_dir, SEGMENTS)?,
        resolve_input(data_dir, POSITIONS)?,
    ))
}

/// Write the SQL, then bin with `runner` and write the CSV.
///
/// # Errors
///
/// Returns runner and writer errors.
pub fn run_with<R: QueryRunner>(out_dir: &Path, kind: RiskKind, config: &RunConfig, runner: &R) -> Result<Vec<PathBuf>> {
    let query = query_for(kind, config);
    let sql = write_sql(out_dir, kind, &query)?;
    let rows = with_area(runner.run(&query)?, query.bin_size);
    let csv = out_dir.join(format!("fishing_bin_{kind}.csv"));
    write_records(&csv, &rows)?;
    Ok(vec![sql, csv])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::spatial::BinnedHours;
    use tempfile::TempDir;

    struct Fixed;

    impl QueryRunner for Fixed {
        fn run(&self, _query: &BinQuery) -> Result<Vec<BinnedHours>> {
            Ok(vec![BinnedHours {
                lat_bin: 0.0,
                lon_bin: 5.0,
                fishing_hours: 12.5,
                risk_class: 2,
            }])
        }
    }

    #[test]
    fn writes_sql_and_table() {
        let dir = TempDir::new().unwrap();
        let paths = run_with(dir.path(), RiskKind::LaborAbuse, &RunConfig::default(), &Fixed).unwrap();
        let sql = std::fs::read_to_string(&paths[0]).unwrap();
        assert!(sql.contains("fishing_la`"));
        let csv = std::fs::read_to_string(&paths[1]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("lat_bin,lon_bin,fishing_hours,risk_class,km2"));
        assert!(lines.next().unwrap().starts_with("0.0,5.0,12.5,2,12391."));
    }

    #[test]
    fn custom_trips_table_kept() {
        let mut config = RunConfig::default();
        config.bins.trips_table = "proj.ds.my_trips".into();
        assert_eq!(query_for(RiskKind::LaborAbuse, &config).trips_table, "proj.ds.my_trips");
    }
}
