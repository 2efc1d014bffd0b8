//! Shared type definitions for the triad tick engine.
//!
//! # Modules
//!
//! - [`rational`] -- [`RationalValue`], the unreduced big-integer fraction
//! - [`policy`] -- Policy selectors fixed at engine construction
//! - [`tick`] -- Trigger codes, microtick phases, and [`TickEvent`] snapshots

pub mod policy;
pub mod rational;
pub mod tick;

// Re-export all public types at crate root for convenience.
pub use policy::{
    EngineMode, KoppaMode, KoppaSchedule, OracleMode, PolicyError, PsiMode, PsiTransform,
    TriggerSource,
};
pub use rational::{RationalError, RationalValue};
pub use tick::{MICROTICKS_PER_TICK, Phase, Rho, TickEvent};

/// Re-exported so downstream crates name the same integer type.
pub use num_bigint::BigInt;
