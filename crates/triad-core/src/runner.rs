//! Bounded run loop with advisory stop and heartbeat logging.
//!
//! This module provides [`run`], which drives an initialized [`TickEngine`]
//! for a fixed number of macro-ticks and forwards snapshots to every
//! registered [`TickSink`]. Around the engine it adds:
//!
//! - **Bounded run**: stop after `ticks` macro-ticks
//! - **Advisory stop**: [`RunControl::request_stop`] is honoured between macro-ticks
//! - **Wall-clock limit**: optional, checked at the same checkpoint
//! - **Heartbeat**: an info log on the first macro-tick and every interval after
//!
//! A single primality test on a very large numerator cannot be interrupted;
//! stop requests take effect once the current macro-tick finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};
use triad_types::{MICROTICKS_PER_TICK, TickEvent};

use crate::config::RunConfig;
use crate::engine::{EngineError, TickEngine};

/// How many snapshots the sinks see per macro-tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One snapshot after the 11th microtick.
    #[default]
    Macrotick,
    /// One snapshot after every microtick.
    Microtick,
}

/// Errors raised by a [`TickSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing to the underlying stream failed.
    #[error("sink I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing a tick event failed.
    #[error("sink serialization error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Errors that can end a run early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The engine failed while advancing.
    #[error("engine error during tick {tick}: {source}")]
    Engine {
        /// Macro-tick (1-based) being executed.
        tick: u64,
        /// The underlying engine error.
        source: EngineError,
    },

    /// A sink rejected a snapshot.
    #[error("sink error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: SinkError,
    },
}

/// Receiver for tick snapshots.
///
/// Implementations write snapshots to stdout, CSV, or track statistics.
/// `tick` is the 1-based macro-tick the snapshot belongs to.
pub trait TickSink {
    /// Called for every emitted snapshot.
    fn on_event(&mut self, tick: u64, event: &TickEvent) -> Result<(), SinkError>;

    /// Called once after the loop ends, however it ends.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl TickSink for NoOpSink {
    fn on_event(&mut self, _tick: u64, _event: &TickEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Shared advisory stop flag.
///
/// Clones share the same flag, so a signal handler or another thread can
/// hold one while the run loop polls another.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    stop_requested: Arc<AtomicBool>,
}

impl RunControl {
    /// A control with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a clean stop at the next macro-tick boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

/// Options for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Macro-ticks to execute.
    pub ticks: u64,
    /// Snapshot granularity for sinks.
    pub granularity: Granularity,
    /// Interval between heartbeat logs.
    pub heartbeat: Duration,
    /// Wall-clock budget, if any.
    pub max_real_time: Option<Duration>,
}

impl RunOptions {
    /// Build options from the `run` config section.
    pub const fn from_config(run: &RunConfig, granularity: Granularity) -> Self {
        let max_real_time = if run.max_real_time_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(run.max_real_time_seconds))
        };
        Self {
            ticks: run.ticks,
            granularity,
            heartbeat: Duration::from_secs(run.heartbeat_seconds),
            max_real_time,
        }
    }
}

/// Reason a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// All requested macro-ticks ran.
    Completed,
    /// [`RunControl::request_stop`] was called.
    Stopped,
    /// The wall-clock budget ran out.
    WallClockLimit,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Why the loop ended.
    pub end_reason: EndReason,
    /// Macro-ticks fully executed.
    pub ticks_completed: u64,
    /// Engine snapshot after the last completed macro-tick.
    pub final_event: TickEvent,
    /// Wall-clock time spent in the loop.
    pub elapsed: Duration,
}

/// Drive `engine` for up to `options.ticks` macro-ticks.
///
/// The engine must already be initialized. Sinks receive snapshots as they
/// are produced and are finished exactly once, including when the loop ends
/// early because of a stop request or the wall-clock limit.
///
/// # Errors
///
/// Returns [`RunnerError::Engine`] if a microtick fails and
/// [`RunnerError::Sink`] if a sink rejects a snapshot. Sinks are not
/// finished on error.
pub fn run(
    engine: &mut TickEngine,
    options: &RunOptions,
    control: &RunControl,
    sinks: &mut [&mut dyn TickSink],
) -> Result<RunSummary, RunnerError> {
    let started = Instant::now();
    let mut last_heartbeat: Option<Instant> = None;
    let mut ticks_completed: u64 = 0;
    let mut end_reason = EndReason::Completed;

    info!(
        ticks = options.ticks,
        granularity = ?options.granularity,
        max_real_time_seconds = options.max_real_time.map_or(0, |d| d.as_secs()),
        "Run starting"
    );

    for tick in 1..=options.ticks {
        if control.is_stop_requested() {
            info!(tick, "Stop requested");
            end_reason = EndReason::Stopped;
            break;
        }
        if options
            .max_real_time
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            warn!(tick, elapsed_secs = started.elapsed().as_secs(), "Wall-clock limit reached");
            end_reason = EndReason::WallClockLimit;
            break;
        }

        run_macrotick(engine, tick, options.granularity, sinks)?;
        ticks_completed = tick;

        if last_heartbeat.is_none_or(|at| at.elapsed() >= options.heartbeat) {
            let state = engine.state();
            info!(
                tick,
                total = options.ticks,
                step = state.step(),
                shadow_bits = state.upsilon_shadow_num().bits(),
                elapsed_secs = started.elapsed().as_secs(),
                "Heartbeat"
            );
            last_heartbeat = Some(Instant::now());
        }
    }

    for sink in sinks.iter_mut() {
        sink.finish()?;
    }

    Ok(RunSummary {
        end_reason,
        ticks_completed,
        final_event: engine.snapshot(),
        elapsed: started.elapsed(),
    })
}

/// Execute one macro-tick and hand its snapshots to the sinks.
fn run_macrotick(
    engine: &mut TickEngine,
    tick: u64,
    granularity: Granularity,
    sinks: &mut [&mut dyn TickSink],
) -> Result<(), RunnerError> {
    let engine_error = |source: EngineError| RunnerError::Engine { tick, source };
    match granularity {
        Granularity::Macrotick => {
            let event = engine
                .advance_macrotick(usize::from(MICROTICKS_PER_TICK))
                .map_err(engine_error)?;
            emit(sinks, tick, &event)?;
        }
        Granularity::Microtick => {
            for _ in 0..MICROTICKS_PER_TICK {
                let event = engine.advance_microtick().map_err(engine_error)?;
                emit(sinks, tick, &event)?;
            }
        }
    }
    Ok(())
}

fn emit(sinks: &mut [&mut dyn TickSink], tick: u64, event: &TickEvent) -> Result<(), SinkError> {
    for sink in sinks.iter_mut() {
        sink.on_event(tick, event)?;
    }
    Ok(())
}

/// Log the end of a run.
pub fn log_run_end(summary: &RunSummary) {
    info!(
        end_reason = ?summary.end_reason,
        ticks_completed = summary.ticks_completed,
        step = summary.final_event.step,
        elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
        "Run ended"
    );
}
