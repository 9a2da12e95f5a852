//! Exact rational numbers for the `Rational` cell variant
//!
//! A thin wrapper over [`num_rational::Ratio<i64>`]. Values are kept
//! normalised with a positive denominator. All arithmetic is checked;
//! overflow surfaces as `None` so callers can turn it into an error cell
//! instead of panicking.

use num_rational::Ratio;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Zero};
use std::fmt;

/// A rational number `num / den`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rational(Ratio<i64>);

impl Rational {
    /// Zero (0/1)
    pub const ZERO: Self = Rational::integer(0);

    /// One (1/1)
    pub const ONE: Self = Rational::integer(1);

    /// Create a normalised rational
    ///
    /// `None` if `den == 0`, or if a negative denominator cannot be moved
    /// onto the numerator without overflow.
    pub fn new(num: i64, den: i64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        if den < 0 {
            return Rational::new(num.checked_neg()?, den.checked_neg()?);
        }
        Some(Rational(Ratio::new(num, den)))
    }

    /// Integer rational (n/1)
    pub const fn integer(n: i64) -> Self {
        Rational(Ratio::new_raw(n, 1))
    }

    pub fn numerator(self) -> i64 {
        *self.0.numer()
    }

    pub fn denominator(self) -> i64 {
        *self.0.denom()
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_integer(self) -> bool {
        self.0.is_integer()
    }

    /// Convert to f64 (lossy)
    pub fn to_f64(self) -> f64 {
        self.numerator() as f64 / self.denominator() as f64
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(&rhs.0).map(Rational)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(&rhs.0).map(Rational)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        self.0.checked_mul(&rhs.0).map(Rational)
    }

    /// `None` on division by zero or overflow
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        self.0.checked_div(&rhs.0).map(Rational)
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Rational(Ratio::new_raw(self.numerator().checked_neg()?, self.denominator())))
    }

    /// Raise to an integer power; negative exponents invert
    pub fn checked_pow(self, exp: i64) -> Option<Self> {
        let base = if exp < 0 { Rational::ONE.checked_div(self)? } else { self };
        let exp = usize::try_from(exp.unsigned_abs()).ok()?;
        num_traits::checked_pow(base.0, exp).map(Rational)
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::integer(n)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numerator())
        } else {
            write!(f, "{}/{}", self.numerator(), self.denominator())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn r(num: i64, den: i64) -> Rational {
        Rational::new(num, den).unwrap()
    }

    #[test]
    fn test_normalisation() {
        assert_eq!(r(2, 4), r(1, 2));
        assert_eq!(r(1, -2), r(-1, 2));
        assert_eq!(r(0, 7), Rational::ZERO);
        assert_eq!(r(-6, -9), r(2, 3));
        assert_eq!(r(-6, -9).denominator(), 3);
        assert!(Rational::new(1, 0).is_none());
        assert!(Rational::new(i64::MIN, -1).is_none());
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(r(1, 2).checked_add(r(1, 3)), Some(r(5, 6)));
        assert_eq!(r(1, 2).checked_sub(r(1, 3)), Some(r(1, 6)));
        assert_eq!(r(2, 3).checked_mul(r(3, 4)), Some(r(1, 2)));
        assert_eq!(r(1, 2).checked_div(r(1, 4)), Some(Rational::integer(2)));
        assert_eq!(r(1, 2).checked_div(Rational::ZERO), None);
        assert_eq!(r(2, 3).checked_pow(2), Some(r(4, 9)));
        assert_eq!(r(2, 3).checked_pow(-1), Some(r(3, 2)));
        assert_eq!(r(2, 3).checked_pow(0), Some(Rational::ONE));
    }

    #[test]
    fn test_overflow_is_none() {
        assert_eq!(Rational::integer(i64::MAX).checked_add(Rational::ONE), None);
        assert_eq!(Rational::integer(i64::MIN).checked_neg(), None);
        assert_eq!(Rational::integer(i64::MAX).checked_pow(2), None);
    }

    #[test]
    fn test_ordering() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(-1, 2) < r(-1, 3));
        assert_eq!(r(2, 4).cmp(&r(1, 2)), Ordering::Equal);
    }

    #[test]
    fn test_display() {
        assert_eq!(r(3, 6).to_string(), "1/2");
        assert_eq!(Rational::integer(-4).to_string(), "-4");
    }
}
