//! Unreduced arbitrary-precision fractions.
//!
//! A [`RationalValue`] is a raw `numerator / denominator` pair of
//! [`BigInt`]s. It is **never canonicalized**: there is no GCD reduction and
//! no sign normalization, so `2/4` and `1/2` are distinct values with
//! distinct fields. The tick engine compares raw fields in several places
//! (the prime trigger, the critical-imbalance transform rule), so the
//! structural representation is part of the contract.
//!
//! Arithmetic combines fields structurally:
//!
//! ```text
//! a/b + c/d = (a*d + c*b) / (b*d)
//! a/b - c/d = (a*d - c*b) / (b*d)
//! a/b * c/d = (a*c) / (b*d)
//! a/b / c/d = (a*d) / (b*c)        fails when c == 0
//! ```
//!
//! Magnitudes grow on every operation, which is why the fields are
//! unbounded integers.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bit budget kept when approximating a fraction as `f64`. Both fields are
/// shifted down until the larger one fits, so the quotient stays finite.
const F64_SAFE_BITS: u64 = 1000;

/// Errors produced by rational construction, parsing, and division.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RationalError {
    /// Seed or fraction text could not be parsed.
    #[error("cannot parse rational from {input:?}: {reason}")]
    Parse {
        /// The offending input text.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A division (or a construction) would produce a zero denominator.
    #[error("division by zero in {operation}")]
    DivideByZero {
        /// The operation that was attempted.
        operation: &'static str,
    },
}

/// An unreduced fraction with a non-zero denominator.
///
/// Equality is structural: `RationalValue::new(2, 4) != RationalValue::new(1, 2)`.
/// Use [`RationalValue::value_eq`] for numeric comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RationalValue {
    numer: BigInt,
    denom: BigInt,
}

impl RationalValue {
    /// Build a fraction from raw fields.
    ///
    /// # Errors
    ///
    /// Returns [`RationalError::DivideByZero`] if `denom` is zero.
    pub fn new(numer: impl Into<BigInt>, denom: impl Into<BigInt>) -> Result<Self, RationalError> {
        let denom = denom.into();
        if denom.is_zero() {
            return Err(RationalError::DivideByZero {
                operation: "construct",
            });
        }
        Ok(Self {
            numer: numer.into(),
            denom,
        })
    }

    /// The integer `n/1`.
    pub fn from_integer(numer: impl Into<BigInt>) -> Self {
        Self {
            numer: numer.into(),
            denom: BigInt::one(),
        }
    }

    /// The multiplicative identity `1/1`.
    pub fn one() -> Self {
        Self::from_integer(1)
    }

    /// Raw numerator.
    pub const fn numer(&self) -> &BigInt {
        &self.numer
    }

    /// Raw denominator. Never zero.
    pub const fn denom(&self) -> &BigInt {
        &self.denom
    }

    /// True when the numerator is zero, regardless of the denominator.
    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    /// Numeric equality by cross-multiplication (`a*d == c*b`).
    pub fn value_eq(&self, other: &Self) -> bool {
        &self.numer * &other.denom == &other.numer * &self.denom
    }

    /// Structural sum `(a*d + c*b) / (b*d)`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn add(&self, rhs: &Self) -> Self {
        Self {
            numer: &self.numer * &rhs.denom + &rhs.numer * &self.denom,
            denom: &self.denom * &rhs.denom,
        }
    }

    /// Structural difference `(a*d - c*b) / (b*d)`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn sub(&self, rhs: &Self) -> Self {
        Self {
            numer: &self.numer * &rhs.denom - &rhs.numer * &self.denom,
            denom: &self.denom * &rhs.denom,
        }
    }

    /// Structural product `(a*c) / (b*d)`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn mul(&self, rhs: &Self) -> Self {
        Self {
            numer: &self.numer * &rhs.numer,
            denom: &self.denom * &rhs.denom,
        }
    }

    /// Cross-multiplied quotient `(a*d) / (b*c)`.
    ///
    /// # Errors
    ///
    /// Returns [`RationalError::DivideByZero`] when the divisor's numerator
    /// is zero. `self` is never modified.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn checked_div(&self, rhs: &Self) -> Result<Self, RationalError> {
        if rhs.numer.is_zero() {
            return Err(RationalError::DivideByZero { operation: "divide" });
        }
        Ok(Self {
            numer: &self.numer * &rhs.denom,
            denom: &self.denom * &rhs.numer,
        })
    }

    /// Negate the numerator, leaving the denominator untouched.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn neg(&self) -> Self {
        Self {
            numer: -&self.numer,
            denom: self.denom.clone(),
        }
    }

    /// Lossy `f64` approximation, for presentation and calibration only.
    ///
    /// Huge fields are shifted down together before conversion so that the
    /// result stays finite whenever the true value is representable.
    pub fn to_f64(&self) -> f64 {
        let bits = self.numer.bits().max(self.denom.bits());
        let shift = bits.saturating_sub(F64_SAFE_BITS);
        let positive = self.numer.is_negative() == self.denom.is_negative();
        let numer = self.numer.magnitude() >> shift;
        let denom = self.denom.magnitude() >> shift;
        if denom.is_zero() {
            // Denominator vanished under the shift: the value is huge.
            return if positive {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            };
        }
        let quotient = numer.to_f64().unwrap_or(f64::NAN) / denom.to_f64().unwrap_or(f64::NAN);
        if positive { quotient } else { -quotient }
    }
}

impl Default for RationalValue {
    fn default() -> Self {
        Self::one()
    }
}

impl fmt::Display for RationalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

impl FromStr for RationalValue {
    type Err = RationalError;

    /// Parse `"<integer>"` (denominator 1) or `"<integer>/<integer>"`.
    ///
    /// Surrounding whitespace is ignored; whitespace inside the text is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let parse_err = |reason: String| RationalError::Parse {
            input: s.to_owned(),
            reason,
        };

        let (numer_text, denom_text) = match text.split_once('/') {
            Some((n, d)) => (n, Some(d)),
            None => (text, None),
        };

        let numer = parse_integer(numer_text).map_err(|e| parse_err(format!("numerator: {e}")))?;
        let denom = match denom_text {
            Some(d) => parse_integer(d).map_err(|e| parse_err(format!("denominator: {e}")))?,
            None => BigInt::one(),
        };

        if denom.is_zero() {
            return Err(parse_err("denominator is zero".to_owned()));
        }

        Ok(Self { numer, denom })
    }
}

/// Parse one signed integer field, rejecting empty text.
fn parse_integer(text: &str) -> Result<BigInt, String> {
    if text.is_empty() {
        return Err("empty".to_owned());
    }
    BigInt::from_str(text).map_err(|e| format!("{e} in {text:?}"))
}

impl Serialize for RationalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RationalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> RationalValue {
        RationalValue::new(n, d).unwrap()
    }

    #[test]
    fn parses_fraction_and_integer() {
        let v: RationalValue = "22/7".parse().unwrap();
        assert_eq!(v.numer(), &BigInt::from(22));
        assert_eq!(v.denom(), &BigInt::from(7));

        let v: RationalValue = "7".parse().unwrap();
        assert_eq!(v, r(7, 1));

        let v: RationalValue = " -3/-9 ".parse().unwrap();
        assert_eq!(v, r(-3, -9));
    }

    #[test]
    fn parse_rejects_zero_denominator() {
        let err = "5/0".parse::<RationalValue>().unwrap_err();
        assert!(matches!(err, RationalError::Parse { .. }));
    }

    #[test]
    fn parse_rejects_malformed_text() {
        for bad in ["", "/", "3/", "/4", "1/2/3", "abc", "1.5", "1 /2", "0x10"] {
            assert!(
                matches!(bad.parse::<RationalValue>(), Err(RationalError::Parse { .. })),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn parses_huge_integers() {
        let text = "426815309786431289045617390287413498701239857640123985764012398576401/11";
        let v: RationalValue = text.parse().unwrap();
        assert_eq!(v.to_string(), text);
    }

    #[test]
    fn construction_rejects_zero_denominator() {
        assert!(matches!(
            RationalValue::new(1, 0),
            Err(RationalError::DivideByZero { .. })
        ));
    }

    #[test]
    fn arithmetic_is_not_reduced() {
        // 1/2 + 1/2 = (1*2 + 1*2) / (2*2) = 4/4
        let half = r(1, 2);
        assert_eq!(half.add(&half), r(4, 4));
        // 1/2 - 1/2 = 0/4
        assert_eq!(half.sub(&half), r(0, 4));
        // 2/4 * 3/6 = 6/24
        assert_eq!(r(2, 4).mul(&r(3, 6)), r(6, 24));
        // 2/4 / 3/6 = 12/12
        assert_eq!(r(2, 4).checked_div(&r(3, 6)).unwrap(), r(12, 12));
        assert_eq!(r(2, 4).neg(), r(-2, 4));
    }

    #[test]
    fn division_by_zero_numerator_fails() {
        let err = r(3, 5).checked_div(&r(0, 9)).unwrap_err();
        assert_eq!(err, RationalError::DivideByZero { operation: "divide" });
    }

    #[test]
    fn structural_vs_value_equality() {
        assert_ne!(r(2, 4), r(1, 2));
        assert!(r(2, 4).value_eq(&r(1, 2)));
        assert!(r(-1, -2).value_eq(&r(1, 2)));
        assert!(!r(1, 3).value_eq(&r(1, 2)));
    }

    #[test]
    fn zero_is_numerator_based() {
        assert!(r(0, 17).is_zero());
        assert!(!r(1, 17).is_zero());
    }

    #[test]
    fn display_keeps_raw_fields() {
        assert_eq!(r(-6, -4).to_string(), "-6/-4");
    }

    #[test]
    fn to_f64_handles_huge_fields() {
        let big = BigInt::from(10).pow(500);
        let v = RationalValue::new(&big * 3, &big * 2).unwrap();
        assert!((v.to_f64() - 1.5).abs() < 1e-12);

        let tiny_denom = RationalValue::new(BigInt::from(10).pow(400), 1).unwrap();
        assert!(tiny_denom.to_f64().is_infinite());

        assert!((r(-1, 4).to_f64() + 0.25).abs() < 1e-15);
    }

    #[test]
    fn serde_uses_text_form() {
        let v = r(19, 7);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"19/7\"");
        let back: RationalValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<RationalValue>("\"1/0\"").is_err());
    }
}
