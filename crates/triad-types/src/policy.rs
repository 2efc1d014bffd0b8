//! Policy selectors for the tick engine.
//!
//! Every engine variant is a named case of one of these enums, fixed once at
//! construction. Tokens are accepted case-insensitively, with `-` treated as
//! `_`, in both the full form (`QUIET_ADDITIVE`) and the single-letter short
//! form (`Q`). Serialization always uses the full `SCREAMING_SNAKE_CASE` name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error for an unrecognized policy token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The token does not name any variant of the policy family.
    #[error("invalid {kind} policy token: {token:?}")]
    InvalidPolicy {
        /// Which policy family was being parsed (e.g. `"psi"`).
        kind: &'static str,
        /// The rejected token.
        token: String,
    },
}

/// Normalize a token: trim, uppercase, `-` to `_`.
fn normalize(token: &str) -> String {
    token.trim().to_uppercase().replace('-', "_")
}

/// Implements `Display`, `FromStr`, and `TryFrom<String>` for a policy enum
/// from a table of `(variant, canonical name, aliases)`.
macro_rules! policy_tokens {
    (
        $ty:ident,
        $kind:literal,
        { $($variant:ident => $name:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical token for this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match normalize(s).as_str() {
                    $($name $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(PolicyError::InvalidPolicy {
                        kind: $kind,
                        token: s.to_owned(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = PolicyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// When the psi-transform fires during a transformation microtick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum PsiMode {
    /// Only at microtick 11.
    Forced,
    /// Whenever rho is non-zero.
    RhoTriggered,
    /// At microtick 11, or whenever rho is non-zero.
    #[default]
    Dual,
    /// Whenever koppa's raw numerator differs from its raw denominator.
    CriticalImbalance,
}

policy_tokens!(PsiMode, "psi", {
    Forced => "FORCED" | "F",
    RhoTriggered => "RHO_TRIGGERED" | "RHO" | "R",
    Dual => "DUAL" | "D",
    CriticalImbalance => "CRITICAL_IMBALANCE" | "CRITICAL" | "C",
});

/// The shape of the psi-transform once it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum PsiTransform {
    /// `upsilon' = koppa / beta`, `beta' = upsilon / koppa`.
    #[default]
    DualReciprocal,
    /// `(a/b, c/d) -> (d/a, b/c)`, assembled from raw fields.
    ReciprocalSwap,
}

policy_tokens!(PsiTransform, "psi transform", {
    DualReciprocal => "DUAL_RECIPROCAL" | "DUAL" | "D",
    ReciprocalSwap => "RECIPROCAL_SWAP" | "SWAP" | "S",
});

/// How koppa absorbs the upsilon/beta imbalance on an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum KoppaMode {
    /// `koppa += upsilon - beta`.
    #[default]
    Accumulate,
    /// `koppa = upsilon / beta`, discarding history.
    Dump,
    /// `koppa *= upsilon / beta`, resetting a zero koppa to `1/1` first.
    RatioFeed,
}

policy_tokens!(KoppaMode, "koppa", {
    Accumulate => "ACCUMULATE" | "A",
    Dump => "DUMP" | "D",
    RatioFeed => "RATIO_FEED" | "FEED" | "F",
});

/// Whether the microtick position overrides the configured koppa mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum KoppaSchedule {
    /// Microtick 7 feeds, 10 dumps, 1 and 4 accumulate.
    #[default]
    Positional,
    /// The configured mode is used at every emission.
    Fixed,
}

policy_tokens!(KoppaSchedule, "koppa schedule", {
    Positional => "POSITIONAL" | "P",
    Fixed => "FIXED" | "F",
});

/// Propagation rule applied to `(upsilon, beta)` on microticks 3, 6, 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum EngineMode {
    /// Move each side by `(upsilon - beta) / 11`, tracking the shadow ledger.
    #[default]
    QuietAdditive,
    /// Move each side by the full difference.
    Additive,
    /// Scale each side by the eleventh-difference.
    Multiplicative,
    /// Swap upsilon and beta.
    Rotational,
}

policy_tokens!(EngineMode, "engine", {
    QuietAdditive => "QUIET_ADDITIVE" | "QUIET" | "Q",
    Additive => "ADDITIVE" | "A",
    Multiplicative => "MULTIPLICATIVE" | "MULTI" | "M",
    Rotational => "ROTATIONAL" | "R",
});

/// Which primality oracle the engine consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum OracleMode {
    /// Miller-Rabin over the fixed witness set.
    #[default]
    MillerRabin,
    /// Every input is reported prime. Guarantees bounded run time.
    AlwaysPrime,
    /// No input is reported prime. Emission never triggers.
    NeverPrime,
}

policy_tokens!(OracleMode, "oracle", {
    MillerRabin => "MILLER_RABIN" | "MR",
    AlwaysPrime => "ALWAYS_PRIME" | "TRIVIAL",
    NeverPrime => "NEVER_PRIME" | "NEVER",
});

/// Which integers the emission trigger feeds to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum TriggerSource {
    /// The upsilon shadow numerator only; yields `Rho::Num`.
    #[default]
    ShadowNumerator,
    /// Upsilon's live numerator and denominator; yields `Num`, `Den`, or `Both`.
    LiveFraction,
}

policy_tokens!(TriggerSource, "trigger", {
    ShadowNumerator => "SHADOW_NUMERATOR" | "SHADOW",
    LiveFraction => "LIVE_FRACTION" | "LIVE",
});
