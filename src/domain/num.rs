//! Decimal helpers shared by the simulation, analyzers and risk engine.
//!
//! `rust_decimal::Decimal` panics on division by zero. Every statistic in this crate
//! instead treats a zero divisor as producing zero, so all divisions go through
//! [`DecimalExt::div_or_zero`]. Callers that need to distinguish "undefined" from a
//! genuine zero must check the divisor themselves.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

use super::error::TradesimError;

pub trait DecimalExt {
    /// `self / rhs`, or zero when `rhs` is zero or the quotient overflows.
    fn div_or_zero(self, rhs: Decimal) -> Decimal;
    /// Square root, or zero for negative input.
    fn sqrt_or_zero(self) -> Decimal;
    /// Integer power, or zero on overflow.
    fn powi_or_zero(self, exp: i64) -> Decimal;
}

impl DecimalExt for Decimal {
    fn div_or_zero(self, rhs: Decimal) -> Decimal {
        if rhs.is_zero() {
            return Decimal::ZERO;
        }
        self.checked_div(rhs).unwrap_or(Decimal::ZERO)
    }

    fn sqrt_or_zero(self) -> Decimal {
        self.sqrt().unwrap_or(Decimal::ZERO)
    }

    fn powi_or_zero(self, exp: i64) -> Decimal {
        self.checked_powi(exp).unwrap_or(Decimal::ZERO)
    }
}

/// Count as a decimal.
pub fn from_count(n: usize) -> Decimal {
    Decimal::from(n)
}

/// Fail-fast literal constructor for trusted input such as constants and fixtures.
///
/// # Panics
///
/// Panics when `s` is not a valid decimal literal. Use [`parse_decimal`] for
/// untrusted input.
pub fn dec_str(s: &str) -> Decimal {
    match parse_decimal(s) {
        Ok(d) => d,
        Err(e) => panic!("{e}"),
    }
}

/// Validating literal constructor.
pub fn parse_decimal(s: &str) -> Result<Decimal, TradesimError> {
    let trimmed = s.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| TradesimError::DecimalParse {
            input: s.to_string(),
            reason: e.to_string(),
        })
}

pub fn to_f64_or_zero(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Non-finite or out-of-range values map to zero.
pub fn from_f64_or_zero(v: f64) -> Decimal {
    if !v.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Clamps to `Decimal::MIN..=Decimal::MAX` instead of zeroing out-of-range values.
/// NaN maps to zero.
pub fn from_f64_saturating(v: f64) -> Decimal {
    if v.is_nan() {
        return Decimal::ZERO;
    }
    if v >= to_f64_or_zero(Decimal::MAX) {
        return Decimal::MAX;
    }
    if v <= to_f64_or_zero(Decimal::MIN) {
        return Decimal::MIN;
    }
    Decimal::from_f64(v).unwrap_or(if v > 0.0 { Decimal::MAX } else { Decimal::MIN })
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[Decimal]) -> Decimal {
    let sum: Decimal = values.iter().copied().sum();
    sum.div_or_zero(from_count(values.len()))
}

/// Sample standard deviation (n - 1 denominator); zero below two observations.
pub fn sample_std_dev(values: &[Decimal], mean: Decimal) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let sum_squares: Decimal = values
        .iter()
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum();
    sum_squares
        .div_or_zero(from_count(values.len() - 1))
        .sqrt_or_zero()
}
