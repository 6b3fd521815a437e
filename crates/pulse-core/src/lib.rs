//! Core domain layer for Studio Pulse.
//!
//! Canonical record and bucket types, period-key normalisation, record
//! classification, derived metrics, period-over-period deltas, formatting and
//! run configuration. Everything here is synchronous and free of file I/O
//! except the persisted last-used settings.

pub mod classify;
pub mod data_processors;
pub mod delta;
pub mod error;
pub mod formatting;
pub mod metrics;
pub mod models;
pub mod period;
pub mod settings;
pub mod time_utils;

pub use error::{PulseError, Result};
