// SPDX-License-Identifier: AGPL-3.0-or-later
//! One-hot design matrices with named feature blocks.
//!
//! Every categorical source column expands into a contiguous run of 0/1
//! columns. The run is a [`FeatureBlock`]; SHAP attribution later sums
//! interaction values block by block. A block is *exclusive* when at most
//! one of its columns can be 1 in any row (a plain one-hot encoding).
//! Multi-hot blocks, such as "encountered a vessel of flag X" over
//! several encounters, are not exclusive.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::ops::Range;

/// A contiguous group of design columns derived from one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureBlock {
    /// Block label used in output tables (`flag`, `gear`, `tas`, ...).
    pub name: String,
    /// Column index range in the design matrix.
    pub columns: Range<usize>,
    /// At most one column of the block is active per row.
    pub exclusive: bool,
}

impl FeatureBlock {
    /// Create a block.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Range<usize>, exclusive: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            exclusive,
        }
    }

    /// Whether column `j` belongs to this block.
    #[must_use]
    pub fn contains(&self, j: usize) -> bool {
        self.columns.contains(&j)
    }
}

/// Dense row-major design matrix with column names and feature blocks.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    columns: Vec<String>,
    blocks: Vec<FeatureBlock>,
    rows: Vec<Vec<f64>>,
}

impl DesignMatrix {
    /// Assemble a design matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a row has the wrong width or the
    /// blocks do not tile `0..columns.len()` in order without gaps.
    pub fn new(columns: Vec<String>, blocks: Vec<FeatureBlock>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let m = columns.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != m) {
            return Err(Error::InvalidInput(format!(
                "row {i} has {} columns, expected {m}",
                row.len()
            )));
        }
        let mut next = 0;
        for block in &blocks {
            if block.columns.start != next || block.columns.end < block.columns.start {
                return Err(Error::InvalidInput(format!(
                    "block '{}' does not start at column {next}",
                    block.name
                )));
            }
            next = block.columns.end;
        }
        if next != m {
            return Err(Error::InvalidInput(format!(
                "blocks cover {next} of {m} columns"
            )));
        }
        Ok(Self {
            columns,
            blocks,
            rows,
        })
    }

    /// Number of samples.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of design columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Feature blocks in column order.
    #[must_use]
    pub fn blocks(&self) -> &[FeatureBlock] {
        &self.blocks
    }

    /// Index of the named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the block owning column `j`.
    #[must_use]
    pub fn block_of(&self, j: usize) -> Option<usize> {
        self.blocks.iter().position(|b| b.contains(j))
    }

    /// Whether indicator column `j` is set in row `i`.
    #[must_use]
    pub fn is_active(&self, i: usize, j: usize) -> bool {
        self.rows[i][j] > 0.5
    }
}

/// Fitted one-hot encoder: sorted categories per source column.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    sources: Vec<EncodedSource>,
}

#[derive(Debug, Clone)]
struct EncodedSource {
    column: String,
    block: String,
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// Learn categories from the training rows.
    ///
    /// `sources` pairs each source column name with its block label;
    /// `rows[i][k]` is the category of source `k` in row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySubset`] if there are no rows, or
    /// [`Error::InvalidInput`] on a ragged row.
    pub fn fit(sources: &[(&str, &str)], rows: &[Vec<&str>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptySubset("no rows to fit one-hot encoder".into()));
        }
        let mut sets: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); sources.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != sources.len() {
                return Err(Error::InvalidInput(format!(
                    "row {i} has {} categorical values, expected {}",
                    row.len(),
                    sources.len()
                )));
            }
            for (set, value) in sets.iter_mut().zip(row) {
                set.insert(*value);
            }
        }
        let sources = sources
            .iter()
            .zip(sets)
            .map(|(&(column, block), set)| EncodedSource {
                column: column.to_string(),
                block: block.to_string(),
                categories: set.into_iter().map(str::to_string).collect(),
            })
            .collect();
        Ok(Self { sources })
    }

    /// Design column names, `<source>_<category>`.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|s| s.categories.iter().map(move |c| format!("{}_{c}", s.column)))
            .collect()
    }

    /// One exclusive block per source column.
    #[must_use]
    pub fn blocks(&self) -> Vec<FeatureBlock> {
        let mut start = 0;
        self.sources
            .iter()
            .map(|s| {
                let end = start + s.categories.len();
                let block = FeatureBlock::new(s.block.clone(), start..end, true);
                start = end;
                block
            })
            .collect()
    }

    /// Categories seen for the named source column.
    #[must_use]
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.sources
            .iter()
            .find(|s| s.column == column)
            .map(|s| s.categories.as_slice())
    }

    /// Encode one row. Unseen categories leave their block all zero.
    #[must_use]
    pub fn encode_row(&self, values: &[&str]) -> Vec<f64> {
        let width = self.sources.iter().map(|s| s.categories.len()).sum();
        let mut out = vec![0.0; width];
        let mut offset = 0;
        for (source, value) in self.sources.iter().zip(values) {
            if let Ok(k) = source.categories.binary_search_by(|c| c.as_str().cmp(value)) {
                out[offset + k] = 1.0;
            }
            offset += source.categories.len();
        }
        out
    }

    /// Encode many rows into a [`DesignMatrix`].
    ///
    /// # Errors
    ///
    /// Propagates [`DesignMatrix::new`] validation errors.
    pub fn transform(&self, rows: &[Vec<&str>]) -> Result<DesignMatrix> {
        let encoded = rows.iter().map(|r| self.encode_row(r)).collect();
        DesignMatrix::new(self.column_names(), self.blocks(), encoded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["china", "trawlers", "long"],
            vec!["group1", "squid_jigger", "short"],
            vec!["china", "squid_jigger", "short"],
        ]
    }

    fn encoder() -> OneHotEncoder {
        OneHotEncoder::fit(
            &[
                ("flag_group", "flag"),
                ("vessel_class", "gear"),
                ("time_at_sea", "tas"),
            ],
            &sample_rows(),
        )
        .unwrap()
    }

    #[test]
    fn columns_sorted_within_source() {
        let enc = encoder();
        assert_eq!(
            enc.column_names(),
            vec![
                "flag_group_china",
                "flag_group_group1",
                "vessel_class_squid_jigger",
                "vessel_class_trawlers",
                "time_at_sea_long",
                "time_at_sea_short",
            ]
        );
    }

    #[test]
    fn blocks_tile_columns() {
        let x = encoder().transform(&sample_rows()).unwrap();
        let blocks = x.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].columns, 0..2);
        assert_eq!(blocks[1].columns, 2..4);
        assert_eq!(blocks[2].columns, 4..6);
        assert!(blocks.iter().all(|b| b.exclusive));
        assert_eq!(x.block_of(3), Some(1));
    }

    #[test]
    fn one_active_per_block() {
        let x = encoder().transform(&sample_rows()).unwrap();
        for i in 0..x.n_rows() {
            for b in x.blocks() {
                let active = b.columns.clone().filter(|&j| x.is_active(i, j)).count();
                assert_eq!(active, 1);
            }
        }
        assert_eq!(x.row(0), &[1.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn unseen_category_encodes_zero() {
        let enc = encoder();
        let row = enc.encode_row(&["other", "trawlers", "long"]);
        assert_eq!(row, vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn design_rejects_gaps_and_ragged_rows() {
        let cols = vec!["a".to_string(), "b".to_string()];
        let gap = vec![FeatureBlock::new("a", 0..1, true)];
        assert!(DesignMatrix::new(cols.clone(), gap, vec![]).is_err());
        let ok = vec![FeatureBlock::new("ab", 0..2, true)];
        assert!(DesignMatrix::new(cols.clone(), ok.clone(), vec![vec![1.0]]).is_err());
        assert!(DesignMatrix::new(cols, ok, vec![vec![1.0, 0.0]]).is_ok());
    }

    #[test]
    fn fit_requires_rows() {
        assert!(OneHotEncoder::fit(&[("a", "a")], &[]).is_err());
    }
}
