// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixed- and random-effect design of the port-visit model.
//!
//! Fixed effects: `[1, psma, after, psma·after]`. Random effects: one
//! intercept per port, ports in sorted ISO3 order. The response is the
//! visit count divided by its maximum.

use super::visits::VisitCell;
use crate::error::{Error, Result};

/// Fixed-effect names, in column order.
pub const FIXED_EFFECTS: [&str; 4] = ["intercept", "psma", "after", "psma:after"];

/// Model inputs built from retained cells.
#[derive(Debug, Clone)]
pub struct PsmaDesign {
    /// Fixed-effect rows.
    pub x: Vec<[f64; 4]>,
    /// Port index of each row (the single active column of `Z`).
    pub port: Vec<usize>,
    /// Port ISO3 codes, sorted.
    pub ports: Vec<String>,
    /// Scaled response `n / max(n)`.
    pub y: Vec<f64>,
    /// Scale divisor.
    pub y_max: f64,
    /// Source cells, row-aligned.
    pub cells: Vec<VisitCell>,
}

impl PsmaDesign {
    /// # Errors
    ///
    /// Returns [`Error::EmptySubset`] for no cells or
    /// [`Error::InvalidInput`] if a cell has zero visits (the log-normal
    /// likelihood needs a positive response).
    #[allow(clippy::cast_precision_loss)]
    pub fn from_cells(cells: Vec<VisitCell>) -> Result<Self> {
        if cells.is_empty() {
            return Err(Error::EmptySubset("no visit cells for the model".into()));
        }
        if let Some(c) = cells.iter().find(|c| c.n_visits == 0) {
            return Err(Error::InvalidInput(format!(
                "cell ({}, {}) has zero visits",
                c.year, c.port_iso3
            )));
        }
        let mut ports: Vec<String> = cells.iter().map(|c| c.port_iso3.clone()).collect();
        ports.sort();
        ports.dedup();
        let y_max = cells.iter().map(|c| c.n_visits).max().unwrap_or(1) as f64;

        let mut x = Vec::with_capacity(cells.len());
        let mut port = Vec::with_capacity(cells.len());
        let mut y = Vec::with_capacity(cells.len());
        for c in &cells {
            let psma = f64::from(u8::from(c.psma));
            let after = f64::from(u8::from(c.after));
            x.push([1.0, psma, after, psma * after]);
            // ports is built from these cells, so the search always hits
            port.push(ports.binary_search(&c.port_iso3).unwrap_or(0));
            y.push(c.n_visits as f64 / y_max);
        }
        Ok(Self {
            x,
            port,
            ports,
            y,
            y_max,
            cells,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    /// Number of ports (columns of `Z`).
    #[must_use]
    pub fn n_ports(&self) -> usize {
        self.ports.len()
    }

    /// Dense random-effect row `i`.
    #[must_use]
    pub fn z_row(&self, i: usize) -> Vec<f64> {
        let mut row = vec![0.0; self.n_ports()];
        row[self.port[i]] = 1.0;
        row
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cell(port: &str, year: i32, n: u64, psma: bool) -> VisitCell {
        VisitCell {
            year,
            port_iso3: port.into(),
            n_visits: n,
            psma,
            after: year == 2017,
        }
    }

    #[test]
    fn design_rows() {
        let d = PsmaDesign::from_cells(vec![
            cell("NOR", 2015, 20, true),
            cell("NOR", 2017, 10, true),
            cell("CHL", 2015, 40, false),
            cell("CHL", 2017, 30, false),
        ])
        .unwrap();
        assert_eq!(d.ports, vec!["CHL", "NOR"]);
        assert_eq!(d.x[1], [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(d.x[3], [1.0, 0.0, 1.0, 0.0]);
        assert_eq!(d.port, vec![1, 1, 0, 0]);
        assert!((d.y[2] - 1.0).abs() < 1e-12);
        assert!((d.y[0] - 0.5).abs() < 1e-12);
        assert_eq!(d.z_row(0), vec![0.0, 1.0]);
    }

    #[test]
    fn rejects_empty_and_zero() {
        assert!(PsmaDesign::from_cells(vec![]).is_err());
        assert!(PsmaDesign::from_cells(vec![cell("NOR", 2015, 0, true)]).is_err());
    }
}
