// SPDX-License-Identifier: AGPL-3.0-or-later
//! Port-visit data for the PSMA before/after model.
//!
//! [`parties`], [`sovereign`] and [`visits`] turn the raw tables into
//! per-(year, port) visit counts; [`retention`] drops low-traffic ports
//! and [`design`] builds the model inputs.

pub mod design;
pub mod parties;
pub mod retention;
pub mod sovereign;
pub mod visits;

pub use design::PsmaDesign;
pub use parties::{PartyAdjustments, PsmaParties};
pub use retention::RetentionConfig;
pub use sovereign::SovereignMap;
pub use visits::{AnalysisVariable, PortVisit, VisitCell};
