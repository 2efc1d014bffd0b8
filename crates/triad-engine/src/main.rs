//! Command-line driver for the triad tick engine.
//!
//! Loads configuration, applies command-line overrides, seeds a
//! [`TickEngine`], and runs it for the requested number of macro-ticks.
//! Stdout carries only tick data; all logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Parse command-line flags
//! 2. Load configuration from `triad-config.yaml` (or `--config`)
//! 3. Initialize structured logging (tracing)
//! 4. Parse seeds and build the engine
//! 5. Build the stdout, CSV, and calibration sinks
//! 6. Run the loop and log the result
//!
//! [`TickEngine`]: triad_core::engine::TickEngine

mod cli;
mod error;
mod sinks;

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use triad_core::calibration::CalibrationTracker;
use triad_core::config::TriadConfig;
use triad_core::engine::TickEngine;
use triad_core::runner::{self, RunControl, RunOptions, RunSummary, TickSink};

use crate::cli::Cli;
use crate::error::EngineError;
use crate::sinks::{ConsoleSink, CsvSink};

/// Config file read when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "triad-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, seeds, the CSV file, or the run fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (mut config, source) = load_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    init_tracing(&config.logging.level);
    let source = source.map_or_else(|| "defaults".to_owned(), |path| path.display().to_string());
    info!(config = %source, "triad-engine starting");

    execute(&config)?;
    Ok(())
}

/// Route logs to stderr, honouring `RUST_LOG` before the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

/// Load the YAML config.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is read
/// if present and defaults are used otherwise. Returns the path actually read.
fn load_config(explicit: Option<&Path>) -> Result<(TriadConfig, Option<PathBuf>), EngineError> {
    if let Some(path) = explicit {
        return Ok((TriadConfig::from_file(path)?, Some(path.to_path_buf())));
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        Ok((TriadConfig::from_file(default_path)?, Some(default_path.to_path_buf())))
    } else {
        Ok((TriadConfig::default(), None))
    }
}

/// Seed the engine, wire the sinks, and run.
fn execute(config: &TriadConfig) -> Result<RunSummary, EngineError> {
    let (upsilon, beta) = config.seeds.parse()?;
    let policies = config.policies;
    info!(
        psi = %policies.psi,
        psi_transform = %policies.psi_transform,
        koppa = %policies.koppa,
        koppa_schedule = %policies.koppa_schedule,
        engine = %policies.engine,
        oracle = %policies.oracle,
        trigger = %policies.trigger,
        forced_emission = policies.forced_emission,
        "Policies selected"
    );

    let mut engine = TickEngine::new(policies);
    engine.initialize(upsilon, beta);

    let mut console = config
        .output
        .stdout
        .then(|| ConsoleSink::new(io::stdout().lock(), config.output.format));

    let mut csv = match &config.output.csv_path {
        Some(path) => {
            let file = File::create(path).map_err(|source| EngineError::CsvFile {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "CSV emission log opened");
            Some(CsvSink::new(BufWriter::new(file)))
        }
        None => None,
    };

    let mut calibration = CalibrationTracker::new(&config.calibration);

    let mut sinks: Vec<&mut dyn TickSink> = Vec::new();
    if let Some(sink) = console.as_mut() {
        sinks.push(sink);
    }
    if let Some(sink) = csv.as_mut() {
        sinks.push(sink);
    }
    if !calibration.is_empty() {
        sinks.push(&mut calibration);
    }

    let options = RunOptions::from_config(&config.run, config.output.granularity);
    // Nothing sets the stop flag here; the wall-clock limit is the only bound.
    let summary = runner::run(&mut engine, &options, &RunControl::new(), &mut sinks)?;
    drop(sinks);

    runner::log_run_end(&summary);
    calibration.log_report();
    Ok(summary)
}
