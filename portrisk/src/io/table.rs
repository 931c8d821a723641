// SPDX-License-Identifier: AGPL-3.0-or-later
//! CSV tables on disk, plain or gzip-compressed.
//!
//! Input tables are exports of warehouse queries. Every reader checks the
//! header for the columns the caller needs before decoding a single row,
//! so a schema drift fails with [`Error::MissingColumn`] instead of a
//! per-row decode error. Compression is detected from the `.gz`
//! extension.
//!
//! Writers create parent directories and use the `csv` crate's serde
//! support; `Option` fields serialize as empty cells.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Open a table for buffered reading.
///
/// Detects gzip compression from the `.gz` file extension and
/// wraps the stream with [`flate2::read::GzDecoder`] when needed.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");
    if ext.eq_ignore_ascii_case("gz") {
        let decoder = flate2::read::GzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Table label used in error messages: the file name without `.csv` /
/// `.csv.gz`.
#[must_use]
pub fn table_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("table");
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.strip_suffix(".csv").unwrap_or(name).to_string()
}

/// Read every record of the table at `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened,
/// [`Error::MissingColumn`] if a `required` column is absent, or
/// [`Error::Csv`] on a malformed row.
pub fn read_records<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    let reader = open_reader(path)?;
    let records = read_records_from(reader, &table_name(path), required).map_err(|e| match e {
        Error::Csv { source, .. } => Error::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    tracing::debug!(path = %path.display(), rows = records.len(), "read table");
    Ok(records)
}

/// Read every record from an in-memory or streamed source.
///
/// `table` labels errors; the CSV error path is the table label.
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] if a `required` column is absent or
/// [`Error::Csv`] on a malformed row.
pub fn read_records_from<R: Read, T: DeserializeOwned>(
    reader: R,
    table: &str,
    required: &[&str],
) -> Result<Vec<T>> {
    let csv_err = |source| Error::Csv {
        path: table.into(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    require_columns(table, &headers, required)?;
    rdr.deserialize().map(|row| row.map_err(csv_err)).collect()
}

/// Check that every `required` column is in `headers`.
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] naming the first absent column.
pub fn require_columns(table: &str, headers: &csv::StringRecord, required: &[&str]) -> Result<()> {
    for &column in required {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Write `records` to `path` with a header row, creating parent
/// directories.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be created or
/// [`Error::Csv`] if a record fails to serialize.
pub fn write_records<I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Serialize,
{
    let mut wtr = create_writer(path)?;
    let csv_err = |source| Error::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rows = 0usize;
    for record in records {
        wtr.serialize(record).map_err(csv_err)?;
        rows += 1;
    }
    wtr.flush().map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), rows, "wrote table");
    Ok(())
}

/// Create a CSV writer at `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory or file cannot be created.
pub fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = File::create(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(file))
}
