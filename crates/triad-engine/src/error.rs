//! Error types for the triad-engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the run itself.

use std::path::PathBuf;

/// Top-level error for the triad-engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or seed parsing failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: triad_core::config::ConfigError,
    },

    /// The run loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: triad_core::runner::RunnerError,
    },

    /// The CSV output file could not be created.
    #[error("cannot create CSV file {}: {source}", .path.display())]
    CsvFile {
        /// Requested CSV path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
