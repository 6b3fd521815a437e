use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by Studio Pulse.
///
/// The aggregation engine itself never returns these: unusable values degrade
/// to zero or a skipped record. Errors only surface at the I/O and
/// configuration boundary.
#[derive(Error, Debug)]
pub enum PulseError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No spreadsheet exports were found under the given directory.
    #[error("No data files found in {0}")]
    NoDataFiles(PathBuf),

    /// A grouping name is not one of the recognised dimensions.
    #[error("Invalid grouping: {0}")]
    InvalidGrouping(String),

    /// A granularity name is neither `month` nor `year`.
    #[error("Invalid granularity: {0}")]
    InvalidGranularity(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the pulse crates.
pub type Result<T> = std::result::Result<T, PulseError>;
