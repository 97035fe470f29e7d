//! Lossless decimal money type backed by rust_decimal.
//!
//! Provides canonical parsing from strings and formatting without exponent notation.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits kept for stored money amounts.
pub const MONEY_SCALE: u32 = 8;

/// Largest single deposit, withdrawal, transfer or exposure (10^15).
const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Largest value any one sub-balance may reach (10^24). Three of them still sum
/// well inside rust_decimal's range.
const MAX_BALANCE_DIGITS: u32 = 24;

/// Lossless decimal numeric type for balances, exposures and P&L.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON string so amounts survive any JSON consumer intact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Convert a float produced by a simulation into a Decimal.
    ///
    /// Non-finite inputs collapse to zero.
    pub fn from_f64_lossy(value: f64) -> Self {
        RustDecimal::from_f64(value).map(Decimal).unwrap_or_default()
    }

    /// Approximate float value, for feeding simulations.
    pub fn to_f64_lossy(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns the value 100.
    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn min(self, other: Decimal) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Decimal) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Upper bound for a single requested amount.
    pub fn max_amount() -> Self {
        Decimal::from(MAX_AMOUNT)
    }

    /// Upper bound for a stored sub-balance.
    pub fn max_balance() -> Self {
        Decimal(RustDecimal::from_i128_with_scale(
            10_i128.pow(MAX_BALANCE_DIGITS),
            0,
        ))
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// `None` on division by zero or overflow.
    pub fn checked_div(self, rhs: Decimal) -> Option<Self> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// `self * percentage / 100`, or `None` if the product overflows.
    pub fn checked_percent(self, percentage: Decimal) -> Option<Self> {
        self.checked_mul(percentage)?.checked_div(Decimal::hundred())
    }

    /// Sum clamped to the representable range, for derived display figures.
    pub fn saturating_add(self, rhs: Decimal) -> Self {
        Decimal(self.0.saturating_add(rhs.0))
    }

    /// Round to [`MONEY_SCALE`] fractional digits (banker's rounding).
    pub fn round_money(&self) -> Self {
        Decimal(self.0.round_dp(MONEY_SCALE))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        assert_eq!(d("5000.00").to_canonical_string(), "5000");
        assert_eq!(d("0.1000").to_canonical_string(), "0.1");
        assert!(!d("123").to_canonical_string().contains('e'));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");
        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_percent() {
        assert_eq!(d("200").checked_percent(d("10")), Some(d("20")));
        assert_eq!(d("1000").checked_percent(d("2.5")), Some(d("25")));
    }

    #[test]
    fn test_checked_ops_report_overflow() {
        let max = Decimal::new(RustDecimal::MAX);
        assert_eq!(max.checked_add(Decimal::one()), None);
        assert_eq!(max.checked_mul(d("2")), None);
        assert_eq!(max.checked_percent(d("1000")), None);
        assert_eq!(d("1").checked_div(Decimal::zero()), None);
        assert_eq!(max.saturating_add(max), max);
        assert_eq!(d("1.5").checked_add(d("2")), Some(d("3.5")));
    }

    #[test]
    fn test_limits() {
        assert_eq!(Decimal::max_amount(), d("1000000000000000"));
        assert_eq!(Decimal::max_balance(), d("1000000000000000000000000"));
        let three = Decimal::max_balance()
            .checked_add(Decimal::max_balance())
            .and_then(|x| x.checked_add(Decimal::max_balance()));
        assert!(three.is_some());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(d("1").min(d("2")), d("1"));
        assert_eq!(d("1").max(d("2")), d("2"));
        assert_eq!(d("-3").max(d("-5")), d("-3"));
    }

    #[test]
    fn test_round_money() {
        assert_eq!(d("1.123456789").round_money(), d("1.12345679"));
        assert_eq!(d("20").round_money(), d("20"));
    }

    #[test]
    fn test_json_serializes_as_string() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert_eq!(json, serde_json::json!("123.456"));
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("123.456"));
    }

    #[test]
    fn test_sum() {
        let total: Decimal = vec![d("1.5"), d("2"), d("-0.5")].into_iter().sum();
        assert_eq!(total, d("3"));
    }

    #[test]
    fn test_from_f64_lossy_non_finite() {
        assert_eq!(Decimal::from_f64_lossy(f64::NAN), Decimal::zero());
        assert_eq!(Decimal::from_f64_lossy(1.5), d("1.5"));
    }
}
