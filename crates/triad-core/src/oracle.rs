//! Primality oracle trait and implementations.
//!
//! During an emission microtick the engine asks a [`PrimalityOracle`]
//! whether a tracked integer is prime. The oracle is injected: the real
//! [`MillerRabin`] test is the default, and the trivial [`AlwaysPrime`] and
//! silent [`NeverPrime`] oracles are explicit, selectable policies. None of
//! them falls back to another; what you configure is what runs.
//!
//! Cost scales with the bit-length of the input. Under sustained
//! quiet-additive propagation the tested shadow numerator grows without
//! bound, so a single call can take arbitrarily long. That is an operational
//! concern for the driver, not an error.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::One;
use triad_types::OracleMode;

/// Fixed Miller-Rabin witness set.
///
/// Exact for every input below 3,825,123,056,546,413,051 and far beyond in
/// practice; probabilistic for larger inputs.
pub const WITNESSES: [u32; 10] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29];

/// A primality test over arbitrary-precision integers.
///
/// Implementations must be deterministic: the same input always yields the
/// same answer. The sign of the input is ignored.
pub trait PrimalityOracle: fmt::Debug {
    /// Report whether `|n|` is prime.
    fn is_prime(&self, n: &BigInt) -> bool;
}

/// Deterministic Miller-Rabin over [`WITNESSES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MillerRabin;

impl PrimalityOracle for MillerRabin {
    fn is_prime(&self, n: &BigInt) -> bool {
        miller_rabin(n.magnitude())
    }
}

/// The trivial oracle: every input is prime.
///
/// Emission fires on every emission microtick, and run time no longer
/// depends on the size of the tested numerator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPrime;

impl PrimalityOracle for AlwaysPrime {
    fn is_prime(&self, _n: &BigInt) -> bool {
        true
    }
}

/// An oracle that never reports a prime. Emission only fires when forced.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPrime;

impl PrimalityOracle for NeverPrime {
    fn is_prime(&self, _n: &BigInt) -> bool {
        false
    }
}

/// Build the oracle a configuration names.
pub fn oracle_for(mode: OracleMode) -> Box<dyn PrimalityOracle> {
    match mode {
        OracleMode::MillerRabin => Box::new(MillerRabin),
        OracleMode::AlwaysPrime => Box::new(AlwaysPrime),
        OracleMode::NeverPrime => Box::new(NeverPrime),
    }
}

/// Miller-Rabin strong-probable-prime test against every witness below `n`.
#[allow(clippy::arithmetic_side_effects)]
pub fn miller_rabin(n: &BigUint) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u8);
    let three = BigUint::from(3u8);

    if *n <= one {
        return false;
    }
    if *n <= three {
        return true;
    }
    if n.is_even() {
        return false;
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_1 = n - &one;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;

    'witness: for base in WITNESSES {
        let a = BigUint::from(base);
        if a >= *n {
            // Witnesses are ascending; every remaining one is too large.
            break;
        }

        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_1 {
            continue;
        }

        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
