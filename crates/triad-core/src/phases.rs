//! Pure phase operations: propagation, koppa update, and the psi-transform.
//!
//! Each function takes the current values by reference and returns the new
//! ones. Nothing here mutates engine state, so a failing operation can never
//! leave the engine half-updated; the engine commits results only after the
//! whole microtick has succeeded.

use num_bigint::BigInt;
use triad_types::{
    EngineMode, KoppaMode, KoppaSchedule, MICROTICKS_PER_TICK, PsiMode, PsiTransform,
    RationalError, RationalValue, Rho,
};

/// Divisor applied to the upsilon/beta difference by the propagation engines.
const PROPAGATION_DIVISOR: i64 = 11;

/// Result of one propagation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propagated {
    /// New upsilon.
    pub upsilon: RationalValue,
    /// New beta.
    pub beta: RationalValue,
    /// Amount to add to the upsilon shadow numerator (and subtract from
    /// beta's). Only quiet-additive propagation advances the shadow ledger.
    pub shadow_delta: Option<BigInt>,
}

/// The koppa mode actually used at an emission microtick.
///
/// Under [`KoppaSchedule::Positional`] microtick 7 forces
/// [`KoppaMode::RatioFeed`], 10 forces [`KoppaMode::Dump`], and 1 and 4
/// force [`KoppaMode::Accumulate`]. Any other position, or the
/// [`KoppaSchedule::Fixed`] schedule, yields `configured`.
pub const fn effective_koppa_mode(
    microtick: u8,
    configured: KoppaMode,
    schedule: KoppaSchedule,
) -> KoppaMode {
    match (schedule, microtick) {
        (KoppaSchedule::Positional, 7) => KoppaMode::RatioFeed,
        (KoppaSchedule::Positional, 10) => KoppaMode::Dump,
        (KoppaSchedule::Positional, 1 | 4) => KoppaMode::Accumulate,
        _ => configured,
    }
}

/// Whether a transformation microtick applies the psi-transform.
///
/// [`PsiMode::CriticalImbalance`] compares koppa's raw fields, not its value:
/// `2/2` is balanced, `-1/-1` is balanced, but `2/1` and `4/2` are not.
pub fn should_transform(mode: PsiMode, microtick: u8, rho: Rho, koppa: &RationalValue) -> bool {
    let last = microtick == MICROTICKS_PER_TICK;
    match mode {
        PsiMode::Forced => last,
        PsiMode::RhoTriggered => rho.is_triggered(),
        PsiMode::Dual => last || rho.is_triggered(),
        PsiMode::CriticalImbalance => koppa.numer() != koppa.denom(),
    }
}

/// Apply a propagation engine to `(upsilon, beta)`.
///
/// With `diff = upsilon - beta` and `delta = diff / 11`:
///
/// - quiet-additive: `upsilon + delta`, `beta - delta`, shadow advances by `delta.num`
/// - additive: `upsilon + diff`, `beta - diff`
/// - multiplicative: `upsilon + upsilon*delta`, `beta - beta*delta`
/// - rotational: swap
pub fn propagate(
    mode: EngineMode,
    upsilon: &RationalValue,
    beta: &RationalValue,
) -> Result<Propagated, RationalError> {
    let diff = upsilon.sub(beta);
    let delta = diff.checked_div(&RationalValue::from_integer(PROPAGATION_DIVISOR))?;

    let propagated = match mode {
        EngineMode::QuietAdditive => Propagated {
            upsilon: upsilon.add(&delta),
            beta: beta.sub(&delta),
            shadow_delta: Some(delta.numer().clone()),
        },
        EngineMode::Additive => Propagated {
            upsilon: upsilon.add(&diff),
            beta: beta.sub(&diff),
            shadow_delta: None,
        },
        EngineMode::Multiplicative => Propagated {
            upsilon: upsilon.add(&upsilon.mul(&delta)),
            beta: beta.sub(&beta.mul(&delta)),
            shadow_delta: None,
        },
        EngineMode::Rotational => Propagated {
            upsilon: beta.clone(),
            beta: upsilon.clone(),
            shadow_delta: None,
        },
    };
    Ok(propagated)
}

/// Compute koppa's new value under `mode`.
///
/// # Errors
///
/// [`KoppaMode::Dump`] and [`KoppaMode::RatioFeed`] divide by beta and fail
/// with [`RationalError::DivideByZero`] when beta's numerator is zero. The
/// caller's koppa is untouched in that case.
pub fn update_koppa(
    mode: KoppaMode,
    koppa: &RationalValue,
    upsilon: &RationalValue,
    beta: &RationalValue,
) -> Result<RationalValue, RationalError> {
    match mode {
        KoppaMode::Accumulate => Ok(koppa.add(&upsilon.sub(beta))),
        KoppaMode::Dump => upsilon.checked_div(beta),
        KoppaMode::RatioFeed => {
            let ratio = upsilon.checked_div(beta)?;
            if koppa.is_zero() {
                Ok(RationalValue::one().mul(&ratio))
            } else {
                Ok(koppa.mul(&ratio))
            }
        }
    }
}

/// Apply the psi-transform, returning the new `(upsilon, beta)`.
///
/// # Errors
///
/// Returns [`RationalError::DivideByZero`] when a divisor numerator is zero:
/// beta or koppa for [`PsiTransform::DualReciprocal`], upsilon or beta for
/// [`PsiTransform::ReciprocalSwap`].
pub fn psi_transform(
    form: PsiTransform,
    upsilon: &RationalValue,
    beta: &RationalValue,
    koppa: &RationalValue,
) -> Result<(RationalValue, RationalValue), RationalError> {
    match form {
        PsiTransform::DualReciprocal => {
            let new_upsilon = koppa.checked_div(beta)?;
            let new_beta = upsilon.checked_div(koppa)?;
            Ok((new_upsilon, new_beta))
        }
        PsiTransform::ReciprocalSwap => {
            if upsilon.is_zero() || beta.is_zero() {
                return Err(RationalError::DivideByZero {
                    operation: "reciprocal swap",
                });
            }
            // (a/b, c/d) -> (d/a, b/c)
            let new_upsilon = RationalValue::new(beta.denom().clone(), upsilon.numer().clone())?;
            let new_beta = RationalValue::new(upsilon.denom().clone(), beta.numer().clone())?;
            Ok((new_upsilon, new_beta))
        }
    }
}
