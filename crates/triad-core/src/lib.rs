//! Microtick engine, primality oracle, and run loop for the triad tick engine.
//!
//! This crate owns the 11-microtick cycle that evolves the three tracked
//! rationals: Emission, Transformation, and Propagation phases, repeated
//! three times and ending on a transformation.
//!
//! # Modules
//!
//! - [`calibration`] -- Best-match tracking against configured target values.
//! - [`config`] -- Configuration loading from `triad-config.yaml` into
//!   strongly-typed structs.
//! - [`engine`] -- [`TickEngine`], the atomic microtick state machine.
//! - [`oracle`] -- [`PrimalityOracle`] trait, Miller-Rabin, and the trivial
//!   oracles.
//! - [`phases`] -- Pure propagation, koppa, and psi-transform functions.
//! - [`runner`] -- Bounded run loop, [`TickSink`] trait, and heartbeat logging.
//!
//! [`TickEngine`]: engine::TickEngine
//! [`PrimalityOracle`]: oracle::PrimalityOracle
//! [`TickSink`]: runner::TickSink

pub mod calibration;
pub mod config;
pub mod engine;
pub mod oracle;
pub mod phases;
pub mod runner;
