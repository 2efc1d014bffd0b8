//! Configuration loading and typed config structures for the triad engine.
//!
//! The configuration lives in `triad-config.yaml` (optional; every field has
//! a default). This module defines strongly-typed structs that mirror the
//! YAML structure and a loader that reads them. Seeds are kept as text here
//! and parsed by [`SeedConfig::parse`] so that a malformed seed fails before
//! any engine exists.
//!
//! ```yaml
//! seeds:
//!   upsilon: "19/7"
//!   beta: "89/11"
//! policies:
//!   psi: DUAL
//!   psi_transform: DUAL_RECIPROCAL
//!   koppa: ACCUMULATE
//!   koppa_schedule: POSITIONAL
//!   engine: QUIET_ADDITIVE
//!   oracle: MILLER_RABIN
//!   trigger: SHADOW_NUMERATOR
//!   forced_emission: false
//! run:
//!   ticks: 100
//!   heartbeat_seconds: 10
//!   max_real_time_seconds: 0
//! output:
//!   stdout: false
//!   format: text
//!   csv_path: trts.csv
//!   granularity: macrotick
//! logging:
//!   level: info
//! calibration:
//!   tolerance: 0.01
//!   targets:
//!     golden_ratio: { value: 1.618033988749895, observable: ratio }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use triad_types::{
    EngineMode, KoppaMode, KoppaSchedule, OracleMode, PsiMode, PsiTransform, RationalError,
    RationalValue, TriggerSource,
};

use crate::calibration::CalibrationConfig;
use crate::runner::Granularity;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A seed could not be parsed as a rational value.
    #[error("invalid {which} seed: {source}")]
    Seed {
        /// Which seed (`"upsilon"` or `"beta"`).
        which: &'static str,
        /// The underlying parse error.
        source: RationalError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `triad-config.yaml`. Defaults reproduce the
/// reference run: seeds `19/7` and `89/11`, dual psi, accumulating koppa,
/// quiet-additive propagation, 100 macro-ticks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TriadConfig {
    /// Seed fractions for upsilon and beta.
    #[serde(default)]
    pub seeds: SeedConfig,

    /// Engine policies, fixed for the whole run.
    #[serde(default)]
    pub policies: PolicyConfig,

    /// Run length and progress reporting.
    #[serde(default)]
    pub run: RunConfig,

    /// Emission sinks.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Target table for the calibration report.
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl TriadConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or a
    /// policy token is not recognized.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// Seed text for the two tracked fractions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Upsilon seed, `"<int>"` or `"<int>/<int>"`.
    #[serde(default = "default_upsilon_seed")]
    pub upsilon: String,

    /// Beta seed, `"<int>"` or `"<int>/<int>"`.
    #[serde(default = "default_beta_seed")]
    pub beta: String,
}

impl SeedConfig {
    /// Parse both seeds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Seed`] naming the first seed that fails.
    pub fn parse(&self) -> Result<(RationalValue, RationalValue), ConfigError> {
        let upsilon = self
            .upsilon
            .parse()
            .map_err(|source| ConfigError::Seed { which: "upsilon", source })?;
        let beta = self
            .beta
            .parse()
            .map_err(|source| ConfigError::Seed { which: "beta", source })?;
        Ok((upsilon, beta))
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            upsilon: default_upsilon_seed(),
            beta: default_beta_seed(),
        }
    }
}

/// Policies selected once at engine construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// When the psi-transform fires.
    #[serde(default)]
    pub psi: PsiMode,

    /// The shape of the psi-transform.
    #[serde(default)]
    pub psi_transform: PsiTransform,

    /// Configured koppa mode (subject to the schedule).
    #[serde(default)]
    pub koppa: KoppaMode,

    /// Whether the microtick position overrides `koppa`.
    #[serde(default)]
    pub koppa_schedule: KoppaSchedule,

    /// Propagation engine.
    #[serde(default)]
    pub engine: EngineMode,

    /// Primality oracle.
    #[serde(default)]
    pub oracle: OracleMode,

    /// Integers fed to the oracle on emission.
    #[serde(default)]
    pub trigger: TriggerSource,

    /// Force a trigger at microtick 10 when nothing fired naturally.
    #[serde(default)]
    pub forced_emission: bool,
}

/// Run length and progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of macro-ticks to execute.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Seconds between heartbeat progress logs.
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,

    /// Wall-clock budget in seconds, checked between macro-ticks (0 = unbounded).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            heartbeat_seconds: default_heartbeat_seconds(),
            max_real_time_seconds: 0,
        }
    }
}

/// Stdout rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdoutFormat {
    /// `[T=<tick>] U=<u> B=<b> K=<k>` lines, long numbers truncated.
    #[default]
    Text,
    /// One JSON-serialized tick event per line.
    Json,
}

/// Emission sink configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Write every emitted snapshot to stdout.
    #[serde(default)]
    pub stdout: bool,

    /// Stdout rendering.
    #[serde(default)]
    pub format: StdoutFormat,

    /// CSV emission log path; disabled when absent.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,

    /// Whether sinks see every microtick or one snapshot per macro-tick.
    #[serde(default)]
    pub granularity: Granularity,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_upsilon_seed() -> String {
    "19/7".to_owned()
}

fn default_beta_seed() -> String {
    "89/11".to_owned()
}

const fn default_ticks() -> u64 {
    100
}

const fn default_heartbeat_seconds() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}
