//! Microtick phases, trigger codes, and per-tick snapshots.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::rational::RationalValue;

/// Microticks in one macro-tick.
pub const MICROTICKS_PER_TICK: u8 = 11;

/// The prime-trigger code computed on an emission microtick.
///
/// Reset to [`Rho::None`] at the start of every microtick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rho {
    /// No trigger.
    #[default]
    None,
    /// The tested numerator was prime.
    Num,
    /// The live denominator was prime.
    Den,
    /// Both the live numerator and denominator were prime.
    Both,
    /// Forced emission at microtick 10 after no natural trigger.
    Forced,
}

impl Rho {
    /// Numeric code, as written to the CSV `rho` column.
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Num => 1,
            Self::Den => 2,
            Self::Both => 3,
            Self::Forced => 4,
        }
    }

    /// True for every code except [`Rho::None`].
    pub const fn is_triggered(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// The role a microtick plays in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Microticks 1, 4, 7, 10: prime trigger and koppa update.
    Emission,
    /// Microticks 2, 5, 8, 11: conditional psi-transform.
    Transformation,
    /// Microticks 3, 6, 9: propagation engine.
    Propagation,
}

impl Phase {
    /// Classify a microtick. Returns `None` outside `1..=11`.
    pub const fn of(microtick: u8) -> Option<Self> {
        match microtick {
            1 | 4 | 7 | 10 => Some(Self::Emission),
            2 | 5 | 8 | 11 => Some(Self::Transformation),
            3 | 6 | 9 => Some(Self::Propagation),
            _ => None,
        }
    }
}

/// Snapshot of the engine after a microtick (or after `initialize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    /// Macro-tick counter.
    pub step: u64,
    /// Microtick just processed (0 right after initialization).
    pub microtick: u8,
    /// Trigger code computed during this microtick.
    pub rho: Rho,
    /// Upsilon after this microtick.
    pub upsilon: RationalValue,
    /// Beta after this microtick.
    pub beta: RationalValue,
    /// Koppa after this microtick.
    pub koppa: RationalValue,
    /// Whether the psi-transform fired on this microtick.
    pub transformed: bool,
    /// Shadow-ledger difference `upsilon_shadow - beta_shadow`.
    #[serde(with = "bigint_text")]
    pub psi_precursor: BigInt,
}

impl TickEvent {
    /// The phase of [`TickEvent::microtick`], if it is in range.
    pub const fn phase(&self) -> Option<Phase> {
        Phase::of(self.microtick)
    }
}

/// Serde adapter writing a [`BigInt`] as decimal text.
mod bigint_text {
    use std::str::FromStr;

    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let text = String::deserialize(deserializer)?;
        BigInt::from_str(&text).map_err(serde::de::Error::custom)
    }
}
