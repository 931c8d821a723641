// SPDX-License-Identifier: AGPL-3.0-or-later
//! Readers and writers for trip tables, result tables and posterior traces.

pub mod table;
pub mod trace;
