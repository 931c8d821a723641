// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for portrisk I/O, model fitting and sampling.
//!
//! All readers, models and summaries report failures through [`Error`],
//! one variant per failure mode. Binaries add context with `anyhow`.

use std::path::PathBuf;

/// Errors produced by portrisk readers, models and writers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error with path context.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// CSV decode or encode error with path context.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// Table being read or written.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
    /// Run configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    /// A required column is absent from an input table.
    #[error("missing column '{column}' in {table}")]
    MissingColumn {
        /// Table name (file stem).
        table: String,
        /// Column that was expected.
        column: String,
    },
    /// A filter left no rows where at least one is required.
    #[error("empty subset: {0}")]
    EmptySubset(String),
    /// Analysis variable not recognised by the port-visit model.
    #[error("unknown analysis variable '{0}'")]
    UnknownVariable(String),
    /// Posterior trace file is malformed.
    #[error("trace format error: {0}")]
    TraceFormat(String),
    /// Invalid input parameters (dimensions, ranges, constraints).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for portrisk operations.
pub type Result<T> = std::result::Result<T, Error>;
