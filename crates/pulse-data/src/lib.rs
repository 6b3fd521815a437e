//! Data layer for Studio Pulse.
//!
//! Responsible for discovering and reading spreadsheet exports, building
//! period bucket tables, merging the session sheet with the check-in feed,
//! rolling up subtotals and running the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod reader;
pub mod rollup;

pub use pulse_core as core;
