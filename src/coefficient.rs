//! Scalar abstraction over basis entries.
//!
//! The reduction engine runs on either fixed-width `i64` entries (fast, but
//! every operation is checked and overflow aborts the call) or
//! `rug::Integer` entries (arbitrary precision, never overflows). Both sit
//! behind the [`Coefficient`] trait so the driver and the integer matrix
//! kernel are written once.

use std::fmt::Debug;

use rug::Integer;

/// An exact integer scalar usable as a basis / transform entry.
///
/// All arithmetic used on the hot composition path is checked: `None`
/// signals that a fixed-width type overflowed, which the driver reports as
/// a fatal error. The arbitrary-precision implementation never returns
/// `None`.
pub trait Coefficient:
    Clone + Default + PartialEq + Debug + Send + Sync + 'static
{
    fn from_i64(value: i64) -> Self;

    /// Conversion from the wide accumulator used inside block kernels.
    fn from_i128(value: i128) -> Option<Self>;

    fn checked_add(&self, rhs: &Self) -> Option<Self>;

    fn checked_sub(&self, rhs: &Self) -> Option<Self>;

    fn checked_mul(&self, rhs: &Self) -> Option<Self>;

    /// Nearest-f64 image of the value. May be infinite for huge entries;
    /// the QR factorizer treats that as a numerical failure.
    fn to_f64(&self) -> f64;

    fn is_zero(&self) -> bool;

    /// Exact inner product of two slices, reported in floating point.
    ///
    /// Exactness of the accumulation is what shields the Cholesky pass from
    /// cancellation on long vectors; only the final rounding is lossy.
    fn dot_f64(lhs: &[Self], rhs: &[Self]) -> f64
    where
        Self: Sized;
}

impl Coefficient for i64 {
    fn from_i64(value: i64) -> Self {
        value
    }

    fn from_i128(value: i128) -> Option<Self> {
        use std::convert::TryFrom;
        i64::try_from(value).ok()
    }

    fn checked_add(&self, rhs: &Self) -> Option<Self> {
        i64::checked_add(*self, *rhs)
    }

    fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        i64::checked_sub(*self, *rhs)
    }

    fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        i64::checked_mul(*self, *rhs)
    }

    fn to_f64(&self) -> f64 {
        *self as f64
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn dot_f64(lhs: &[Self], rhs: &[Self]) -> f64 {
        // Pairwise products of i64 always fit an i128; the sum of n of
        // them stays far below the i128 range for any representable n.
        lhs.iter()
            .zip(rhs)
            .map(|(a, b)| i128::from(*a) * i128::from(*b))
            .sum::<i128>() as f64
    }
}

impl Coefficient for Integer {
    fn from_i64(value: i64) -> Self {
        Integer::from(value)
    }

    fn from_i128(value: i128) -> Option<Self> {
        Some(Integer::from(value))
    }

    fn checked_add(&self, rhs: &Self) -> Option<Self> {
        Some(Integer::from(self + rhs))
    }

    fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        Some(Integer::from(self - rhs))
    }

    fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        Some(Integer::from(self * rhs))
    }

    fn to_f64(&self) -> f64 {
        Integer::to_f64(self)
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn dot_f64(lhs: &[Self], rhs: &[Self]) -> f64 {
        lhs.iter()
            .zip(rhs)
            .map(|(a, b)| Integer::from(a * b))
            .sum::<Integer>()
            .to_f64()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_width_overflow_is_detected() {
        let big = i64::MAX;
        assert_eq!(Coefficient::checked_add(&big, &1), None);
        assert_eq!(Coefficient::checked_mul(&big, &2), None);
        assert_eq!(Coefficient::checked_sub(&i64::MIN, &1), None);
    }

    #[test]
    fn dot_is_exact_past_the_i64_range() {
        let a = vec![i64::MAX, i64::MAX];
        let b = vec![i64::MAX, i64::MAX];
        let exact = 2.0 * (i64::MAX as f64) * (i64::MAX as f64);
        let got = <i64 as Coefficient>::dot_f64(&a, &b);
        assert!((got - exact).abs() / exact < 1e-12);
    }

    #[test]
    fn bignum_never_overflows() {
        let big = Integer::from(i64::MAX);
        let sum = Coefficient::checked_add(&big, &Integer::from(1)).unwrap();
        assert_eq!(sum, Integer::from(i64::MAX) + 1);
    }
}
