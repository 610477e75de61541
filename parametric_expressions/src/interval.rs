//! Closed real intervals with outward-rounded arithmetic.
//!
//! Every operation returns a superset of the exact image of its inputs. Basic arithmetic
//! (`+`, `-`, `*`, division and `sqrt`) uses error-free transforms to detect whether the
//! rounded endpoint is exact, and only steps one ulp outward when it is not, so operations
//! that happen to be exact (for example `sqrt([4, 9]) = [2, 3]`) stay tight. Library
//! transcendentals are not correctly rounded and are always widened by one ulp.
//!
//! The empty interval is represented by the sentinel `lower > upper` (`Interval::EMPTY`).

use core::f64::consts::{FRAC_PI_2, PI, TAU};
use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use crate::error::DomainError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

// Below this magnitude the fma residuals may be polluted by underflow.
const TINY: f64 = 1e-290;

fn two_sum_residual(a: f64, b: f64, s: f64) -> f64 {
    let bb = s - a;
    (a - (s - bb)) + (b - bb)
}

fn add_down(a: f64, b: f64) -> f64 {
    let s = a + b;
    if s.is_finite() {
        if two_sum_residual(a, b, s) < 0.0 { s.next_down() } else { s }
    } else if s == f64::INFINITY && a.is_finite() && b.is_finite() {
        f64::MAX
    } else {
        s
    }
}

fn add_up(a: f64, b: f64) -> f64 {
    let s = a + b;
    if s.is_finite() {
        if two_sum_residual(a, b, s) > 0.0 { s.next_up() } else { s }
    } else if s == f64::NEG_INFINITY && a.is_finite() && b.is_finite() {
        f64::MIN
    } else {
        s
    }
}

// 0 * inf is taken as 0: an endpoint at zero pins the product regardless of the other bound.
fn endpoint_mul(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 { 0.0 } else { a * b }
}

fn mul_down(a: f64, b: f64) -> f64 {
    let p = endpoint_mul(a, b);
    if p == 0.0 && (a == 0.0 || b == 0.0) {
        return 0.0;
    }
    if !p.is_finite() {
        return if p == f64::INFINITY && a.is_finite() && b.is_finite() { f64::MAX } else { p };
    }
    if p.abs() < TINY {
        return p.next_down();
    }
    if a.mul_add(b, -p) < 0.0 { p.next_down() } else { p }
}

fn mul_up(a: f64, b: f64) -> f64 {
    let p = endpoint_mul(a, b);
    if p == 0.0 && (a == 0.0 || b == 0.0) {
        return 0.0;
    }
    if !p.is_finite() {
        return if p == f64::NEG_INFINITY && a.is_finite() && b.is_finite() { f64::MIN } else { p };
    }
    if p.abs() < TINY {
        return p.next_up();
    }
    if a.mul_add(b, -p) > 0.0 { p.next_up() } else { p }
}

/// Sign of `exact - q` for `q = a / b`, or `None` when the residual can't be trusted.
fn div_error_sign(a: f64, b: f64, q: f64) -> Option<f64> {
    if !q.is_finite() || !b.is_finite() || q.abs() < TINY {
        return None;
    }
    let r = -q.mul_add(b, -a);
    Some(r * b.signum())
}

fn div_down(a: f64, b: f64) -> f64 {
    let q = a / b;
    if q.is_nan() {
        return f64::NEG_INFINITY;
    }
    if a == 0.0 {
        return 0.0;
    }
    match div_error_sign(a, b, q) {
        Some(s) if s >= 0.0 => q,
        Some(_) => q.next_down(),
        None if q == f64::INFINITY && a.is_finite() => f64::MAX,
        None if q.is_infinite() => q,
        None => q.next_down(),
    }
}

fn div_up(a: f64, b: f64) -> f64 {
    let q = a / b;
    if q.is_nan() {
        return f64::INFINITY;
    }
    if a == 0.0 {
        return 0.0;
    }
    match div_error_sign(a, b, q) {
        Some(s) if s <= 0.0 => q,
        Some(_) => q.next_up(),
        None if q == f64::NEG_INFINITY && a.is_finite() => f64::MIN,
        None if q.is_infinite() => q,
        None => q.next_up(),
    }
}

fn sqrt_down(x: f64) -> f64 {
    let r = x.sqrt();
    if r == 0.0 || !r.is_finite() {
        return r;
    }
    if x < TINY {
        return r.next_down().max(0.0);
    }
    if r.mul_add(r, -x) > 0.0 { r.next_down() } else { r }
}

fn sqrt_up(x: f64) -> f64 {
    let r = x.sqrt();
    if !r.is_finite() {
        return r;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x < TINY {
        return r.next_up();
    }
    if r.mul_add(r, -x) < 0.0 { r.next_up() } else { r }
}

fn min4(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a.min(b).min(c.min(d))
}

fn max4(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a.max(b).max(c.max(d))
}

/// Whether `phase + k * period` may lie in `[lower, upper]` for some integer `k`.
///
/// Errs on the side of `true`: the slack absorbs the rounding of `phase` and `period`.
fn may_contain_phase(lower: f64, upper: f64, phase: f64, period: f64) -> bool {
    let slack = 4.0 * f64::EPSILON * lower.abs().max(upper.abs()).max(1.0);
    let k = ((lower - phase) / period).ceil();
    phase + k * period <= upper + slack || phase + (k - 1.0) * period >= lower - slack
}

impl Interval {
    pub const EMPTY: Self = Self {
        lower: f64::INFINITY,
        upper: f64::NEG_INFINITY,
    };
    pub const WHOLE: Self = Self {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };
    pub const UNIT: Self = Self { lower: 0.0, upper: 1.0 };

    /// Construct `[lower, upper]`. Callers are expected to pass `lower <= upper`.
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(!(lower > upper), "lower ({lower}) > upper ({upper})");
        Self { lower, upper }
    }

    pub fn singleton(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// Smallest interval containing both values, in either order.
    pub fn hull_of(a: f64, b: f64) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    pub fn lower(self) -> f64 {
        self.lower
    }

    pub fn upper(self) -> f64 {
        self.upper
    }

    pub fn is_empty(self) -> bool {
        !(self.lower <= self.upper)
    }

    pub fn is_singleton(self) -> bool {
        self.lower == self.upper
    }

    pub fn width(self) -> f64 {
        if self.is_empty() { 0.0 } else { self.upper - self.lower }
    }

    pub fn median(self) -> f64 {
        self.lower + 0.5 * (self.upper - self.lower)
    }

    pub fn interpolated(self, t: f64) -> f64 {
        self.lower + t * (self.upper - self.lower)
    }

    pub fn clamp(self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    pub fn contains(self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn contains_interval(self, other: Self) -> bool {
        other.is_empty() || (self.lower <= other.lower && other.upper <= self.upper)
    }

    pub fn overlaps(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.lower <= other.upper && other.lower <= self.upper
    }

    pub fn hull(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    pub fn intersection(self, other: Self) -> Self {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if lower <= upper { Self { lower, upper } } else { Self::EMPTY }
    }

    pub fn bisected(self) -> (Self, Self) {
        let mid = self.median();
        (
            Self {
                lower: self.lower,
                upper: mid,
            },
            Self {
                lower: mid,
                upper: self.upper,
            },
        )
    }

    fn widened(lower: f64, upper: f64) -> Self {
        Self {
            lower: lower.next_down(),
            upper: upper.next_up(),
        }
    }

    fn clipped_to(self, lower: f64, upper: f64) -> Self {
        Self {
            lower: self.lower.max(lower),
            upper: self.upper.min(upper),
        }
    }

    pub fn squared(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if self.lower >= 0.0 {
            Self {
                lower: mul_down(self.lower, self.lower),
                upper: mul_up(self.upper, self.upper),
            }
        } else if self.upper <= 0.0 {
            Self {
                lower: mul_down(self.upper, self.upper),
                upper: mul_up(self.lower, self.lower),
            }
        } else {
            let m = (-self.lower).max(self.upper);
            Self {
                lower: 0.0,
                upper: mul_up(m, m),
            }
        }
    }

    pub fn abs(self) -> Self {
        if self.is_empty() || self.lower >= 0.0 {
            self
        } else if self.upper <= 0.0 {
            -self
        } else {
            Self {
                lower: 0.0,
                upper: (-self.lower).max(self.upper),
            }
        }
    }

    /// Division; fails if the divisor contains zero.
    pub fn checked_div(self, rhs: Self) -> Result<Self, DomainError> {
        if self.is_empty() || rhs.is_empty() {
            return Ok(Self::EMPTY);
        }
        if rhs.contains(0.0) {
            return Err(DomainError::division_by_zero(rhs.lower, rhs.upper));
        }
        let (a, b, c, d) = (self.lower, self.upper, rhs.lower, rhs.upper);
        Ok(Self {
            lower: min4(div_down(a, c), div_down(a, d), div_down(b, c), div_down(b, d)),
            upper: max4(div_up(a, c), div_up(a, d), div_up(b, c), div_up(b, d)),
        })
    }

    /// Square root; the negative part of the input is discarded. Fails if `upper < -tolerance`.
    pub fn sqrt(self, tolerance: f64) -> Result<Self, DomainError> {
        if self.is_empty() {
            return Ok(Self::EMPTY);
        }
        if self.upper < -tolerance {
            return Err(DomainError::out_of_domain("sqrt", self.lower, self.upper));
        }
        Ok(Self {
            lower: sqrt_down(self.lower.max(0.0)),
            upper: sqrt_up(self.upper.max(0.0)),
        })
    }

    pub fn sin(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !(self.width() < TAU) {
            return Self::new(-1.0, 1.0);
        }
        let (a, b) = (self.lower.sin(), self.upper.sin());
        let mut out = Self::widened(a.min(b), a.max(b));
        if may_contain_phase(self.lower, self.upper, FRAC_PI_2, TAU) {
            out.upper = 1.0;
        }
        if may_contain_phase(self.lower, self.upper, -FRAC_PI_2, TAU) {
            out.lower = -1.0;
        }
        out.clipped_to(-1.0, 1.0)
    }

    pub fn cos(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !(self.width() < TAU) {
            return Self::new(-1.0, 1.0);
        }
        let (a, b) = (self.lower.cos(), self.upper.cos());
        let mut out = Self::widened(a.min(b), a.max(b));
        if may_contain_phase(self.lower, self.upper, 0.0, TAU) {
            out.upper = 1.0;
        }
        if may_contain_phase(self.lower, self.upper, PI, TAU) {
            out.lower = -1.0;
        }
        out.clipped_to(-1.0, 1.0)
    }

    /// Tangent; an interval straddling a pole maps to the whole real line.
    pub fn tan(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !(self.width() < PI) || may_contain_phase(self.lower, self.upper, FRAC_PI_2, PI) {
            return Self::WHOLE;
        }
        Self::widened(self.lower.tan(), self.upper.tan())
    }

    /// Arcsine; the input is clamped to `[-1, 1]`. Fails if it doesn't overlap the domain at all.
    pub fn asin(self, tolerance: f64) -> Result<Self, DomainError> {
        let clamped = self.unit_domain("asin", tolerance)?;
        Ok(Self::widened(clamped.lower.asin(), clamped.upper.asin()).clipped_to(-FRAC_PI_2.next_up(), FRAC_PI_2.next_up()))
    }

    /// Arccosine; the input is clamped to `[-1, 1]`. Fails if it doesn't overlap the domain at all.
    pub fn acos(self, tolerance: f64) -> Result<Self, DomainError> {
        let clamped = self.unit_domain("acos", tolerance)?;
        Ok(Self::widened(clamped.upper.acos(), clamped.lower.acos()).clipped_to(0.0, PI.next_up()))
    }

    fn unit_domain(self, function: &'static str, tolerance: f64) -> Result<Self, DomainError> {
        if self.is_empty() {
            return Ok(Self::EMPTY);
        }
        let domain = Self::new(-1.0 - tolerance, 1.0 + tolerance);
        if !domain.overlaps(self) {
            return Err(DomainError::out_of_domain(function, self.lower, self.upper));
        }
        Ok(self.clipped_to(-1.0, 1.0))
    }

    pub fn atan(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::widened(self.lower.atan(), self.upper.atan())
    }

    /// Four-quadrant arctangent of `y / x`.
    ///
    /// The quadrant is resolved from the signs of the bounds: right half-plane uses `atan(y / x)`,
    /// upper and lower half-planes rotate by a quarter turn, and anything straddling the origin
    /// or the negative x axis gets the full `[-pi, pi]` range.
    pub fn atan2(y: Self, x: Self) -> Self {
        if y.is_empty() || x.is_empty() {
            return Self::EMPTY;
        }
        let quarter = Self::widened(FRAC_PI_2, FRAC_PI_2);
        let rotated = |q: Result<Self, DomainError>| q.map(Self::atan);
        let result = if x.lower > 0.0 {
            rotated(y.checked_div(x))
        } else if y.lower > 0.0 {
            rotated((-x).checked_div(y)).map(|a| a + quarter)
        } else if y.upper < 0.0 {
            rotated((-x).checked_div(y)).map(|a| a - quarter)
        } else {
            Err(DomainError::division_by_zero(0.0, 0.0))
        };
        result.unwrap_or(Self::widened(-PI, PI))
    }

    pub fn exp(self) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self {
            lower: self.lower.exp().next_down().max(0.0),
            upper: self.upper.exp().next_up(),
        }
    }

    /// Natural logarithm; fails if `upper <= 0`, otherwise a non-positive lower bound maps to `-inf`.
    pub fn ln(self) -> Result<Self, DomainError> {
        if self.is_empty() {
            return Ok(Self::EMPTY);
        }
        if self.upper <= 0.0 {
            return Err(DomainError::out_of_domain("log", self.lower, self.upper));
        }
        let lower = if self.lower <= 0.0 {
            f64::NEG_INFINITY
        } else {
            self.lower.ln().next_down()
        };
        Ok(Self {
            lower,
            upper: self.upper.ln().next_up(),
        })
    }

    fn powu(self, n: u32) -> Self {
        let mut result = Self::singleton(1.0);
        let mut base = self;
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                result = result * base;
            }
            n >>= 1;
            if n > 0 {
                base = base.squared();
            }
        }
        result
    }

    /// Integer power. Fails for a negative exponent when the base contains zero.
    pub fn powi(self, exponent: i32) -> Result<Self, DomainError> {
        if self.is_empty() {
            return Ok(Self::EMPTY);
        }
        let n = exponent.unsigned_abs();
        // Even powers depend only on |x|; odd powers are monotone, so evaluate at the endpoints.
        let monotone = if n % 2 == 0 { self.abs() } else { self };
        let positive = Self {
            lower: Self::singleton(monotone.lower).powu(n).lower,
            upper: Self::singleton(monotone.upper).powu(n).upper,
        };
        if exponent >= 0 {
            Ok(positive)
        } else {
            Self::singleton(1.0)
                .checked_div(positive)
                .map_err(|_| DomainError::division_by_zero(self.lower, self.upper))
        }
    }

    /// Real power `self^exponent`, computed as `exp(ln(self) * exponent)` over the non-negative
    /// part of the base. A singleton integer exponent defers to [`Interval::powi`].
    pub fn powf(self, exponent: Self) -> Result<Self, DomainError> {
        if self.is_empty() || exponent.is_empty() {
            return Ok(Self::EMPTY);
        }
        if exponent.is_singleton() && exponent.lower.fract() == 0.0 && exponent.lower.abs() <= f64::from(i32::MAX) {
            return self.powi(exponent.lower as i32);
        }
        if self.upper <= 0.0 {
            return Err(DomainError::out_of_domain("pow", self.lower, self.upper));
        }
        let base = Self {
            lower: self.lower.max(0.0),
            upper: self.upper,
        };
        Ok((base.ln()? * exponent).exp())
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::singleton(0.0)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Self::singleton(value)
    }
}

impl Zero for Interval {
    fn zero() -> Self {
        Self::singleton(0.0)
    }

    fn is_zero(&self) -> bool {
        self.lower == 0.0 && self.upper == 0.0
    }
}

impl One for Interval {
    fn one() -> Self {
        Self::singleton(1.0)
    }
}

impl Neg for Interval {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            lower: -self.upper,
            upper: -self.lower,
        }
    }
}

impl Add for Interval {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_empty() || rhs.is_empty() {
            return Self::EMPTY;
        }
        Self {
            lower: add_down(self.lower, rhs.lower),
            upper: add_up(self.upper, rhs.upper),
        }
    }
}

impl Sub for Interval {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for Interval {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_empty() || rhs.is_empty() {
            return Self::EMPTY;
        }
        let (a, b, c, d) = (self.lower, self.upper, rhs.lower, rhs.upper);
        Self {
            lower: min4(mul_down(a, c), mul_down(a, d), mul_down(b, c), mul_down(b, d)),
            upper: max4(mul_up(a, c), mul_up(a, d), mul_up(b, c), mul_up(b, d)),
        }
    }
}

macro_rules! impl_mixed_f64_ops {
    ($($Trait:ident, $method:ident, $AssignTrait:ident, $assign:ident;)*) => {
        $(
            impl $Trait<f64> for Interval {
                type Output = Self;

                fn $method(self, rhs: f64) -> Self {
                    $Trait::$method(self, Self::singleton(rhs))
                }
            }

            impl $Trait<Interval> for f64 {
                type Output = Interval;

                fn $method(self, rhs: Interval) -> Interval {
                    $Trait::$method(Interval::singleton(self), rhs)
                }
            }

            impl $AssignTrait for Interval {
                fn $assign(&mut self, rhs: Self) {
                    *self = $Trait::$method(*self, rhs);
                }
            }

            impl $AssignTrait<f64> for Interval {
                fn $assign(&mut self, rhs: f64) {
                    *self = $Trait::$method(*self, rhs);
                }
            }
        )*
    };
}

impl_mixed_f64_ops! {
    Add, add, AddAssign, add_assign;
    Sub, sub, SubAssign, sub_assign;
    Mul, mul, MulAssign, mul_assign;
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("[]")
        } else if self.is_singleton() {
            write!(f, "[{}]", self.lower)
        } else {
            write!(f, "[{}, {}]", self.lower, self.upper)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_operations_stay_tight() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(0.5, 4.0);
        assert_eq!(a + b, Interval::new(1.5, 6.0));
        assert_eq!(a * b, Interval::new(0.5, 8.0));
        assert_eq!(Interval::new(4.0, 9.0).sqrt(0.0).unwrap(), Interval::new(2.0, 3.0));
        assert_eq!(a.checked_div(Interval::new(2.0, 4.0)).unwrap(), Interval::new(0.25, 1.0));
    }

    #[test]
    fn inexact_operations_round_outward() {
        let tenth = Interval::singleton(0.1);
        let sum = tenth + Interval::singleton(0.2);
        // 0.1 + 0.2 is not representable; the enclosure must straddle the rounded result.
        assert!(sum.lower() < sum.upper());
        assert!(sum.contains(0.1 + 0.2));

        let third = Interval::singleton(1.0).checked_div(Interval::singleton(3.0)).unwrap();
        assert!(third.lower() < third.upper());
        assert!(third.lower() * 3.0 <= 1.0);
        assert!(third.upper() * 3.0 >= 1.0);
    }

    #[test]
    fn empty_sentinel_propagates() {
        assert!(Interval::EMPTY.is_empty());
        assert!((Interval::EMPTY + Interval::UNIT).is_empty());
        assert!((Interval::UNIT * Interval::EMPTY).is_empty());
        assert!(Interval::new(0.0, 1.0).intersection(Interval::new(2.0, 3.0)).is_empty());
        assert_eq!(Interval::EMPTY.to_string(), "[]");
    }

    #[test]
    fn division_by_zero_containing_interval_fails() {
        let err = Interval::UNIT.checked_div(Interval::new(-1.0, 1.0)).unwrap_err();
        assert!(matches!(err, DomainError::DivisionByZero { .. }));
    }

    #[test]
    fn squared_is_tighter_than_self_product() {
        let x = Interval::new(-1.0, 2.0);
        assert_eq!(x.squared(), Interval::new(0.0, 4.0));
        assert_eq!(x * x, Interval::new(-2.0, 4.0));
    }

    #[test]
    fn sin_and_cos_pick_up_extrema() {
        let s = Interval::new(0.0, PI).sin();
        assert_eq!(s.upper(), 1.0);
        assert!(s.lower() <= 0.0 && s.lower() > -1e-15);

        let c = Interval::new(0.5, 4.0).cos();
        assert_eq!(c.lower(), -1.0);

        assert_eq!(Interval::new(0.0, 10.0).sin(), Interval::new(-1.0, 1.0));
    }

    #[test]
    fn tan_across_pole_is_whole() {
        assert_eq!(Interval::new(1.0, 2.0).tan(), Interval::WHOLE);
        let t = Interval::new(-0.5, 0.5).tan();
        assert!(t.contains(0.5f64.tan()) && t.contains((-0.5f64).tan()));
    }

    #[test]
    fn arcsine_clamps_partial_overlap() {
        let a = Interval::new(0.5, 3.0).asin(0.0).unwrap();
        assert!(a.contains(FRAC_PI_2));
        assert!(Interval::new(2.0, 3.0).asin(1e-12).is_err());
        assert!(Interval::new(-3.0, -2.0).acos(1e-12).is_err());
    }

    #[test]
    fn log_and_sqrt_domains() {
        assert!(Interval::new(-2.0, -1.0).ln().is_err());
        assert_eq!(Interval::new(-1.0, 1.0).ln().unwrap().lower(), f64::NEG_INFINITY);
        assert!(Interval::new(-2.0, -1.0).sqrt(1e-12).is_err());
        assert_eq!(Interval::new(-1.0, 4.0).sqrt(1e-12).unwrap(), Interval::new(0.0, 2.0));
    }

    #[test]
    fn integer_powers() {
        assert_eq!(Interval::new(-2.0, 3.0).powi(2).unwrap(), Interval::new(0.0, 9.0));
        assert_eq!(Interval::new(-2.0, 3.0).powi(3).unwrap(), Interval::new(-8.0, 27.0));
        assert_eq!(Interval::new(2.0, 4.0).powi(-1).unwrap(), Interval::new(0.25, 0.5));
        assert!(Interval::new(-1.0, 1.0).powi(-2).is_err());
        assert_eq!(Interval::new(-5.0, 5.0).powi(0).unwrap(), Interval::singleton(1.0));
    }

    #[test]
    fn real_powers_go_through_exp_log() {
        let p = Interval::new(4.0, 9.0).powf(Interval::singleton(0.5)).unwrap();
        assert!(p.contains_interval(Interval::new(2.0, 3.0)));
        assert!(p.width() < 1.0 + 1e-9);
        assert!(Interval::new(-3.0, -1.0).powf(Interval::singleton(0.5)).is_err());
    }

    #[test]
    fn atan2_resolves_quadrants() {
        let right = Interval::atan2(Interval::singleton(1.0), Interval::singleton(1.0));
        assert!(right.contains(core::f64::consts::FRAC_PI_4));

        let up = Interval::atan2(Interval::singleton(1.0), Interval::singleton(-1.0));
        assert!(up.contains(3.0 * core::f64::consts::FRAC_PI_4));

        let down = Interval::atan2(Interval::singleton(-1.0), Interval::singleton(-1.0));
        assert!(down.contains(-3.0 * core::f64::consts::FRAC_PI_4));

        let around = Interval::atan2(Interval::new(-1.0, 1.0), Interval::new(-1.0, 1.0));
        assert!(around.contains(PI) && around.contains(-PI));
    }

    #[test]
    fn predicates_and_set_operations() {
        let a = Interval::new(0.0, 2.0);
        let b = Interval::new(1.0, 3.0);
        assert!(a.overlaps(b));
        assert!(!a.overlaps(Interval::new(2.5, 3.0)));
        assert_eq!(a.hull(b), Interval::new(0.0, 3.0));
        assert_eq!(a.intersection(b), Interval::new(1.0, 2.0));
        assert_eq!(a.bisected(), (Interval::new(0.0, 1.0), Interval::new(1.0, 2.0)));
        assert_eq!(a.clamp(5.0), 2.0);
        assert_eq!(a.median(), 1.0);
        assert_eq!(Interval::hull_of(3.0, -1.0), Interval::new(-1.0, 3.0));
        assert_eq!(Interval::singleton(2.5).to_string(), "[2.5]");
        assert_eq!(a.to_string(), "[0, 2]");
    }
}
