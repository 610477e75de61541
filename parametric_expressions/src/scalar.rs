use core::fmt::Debug;
use core::ops::{Add, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::error::DomainError;
use crate::interval::Interval;

/// Scalar algebra shared by point evaluation (`f64`) and bounds evaluation (`Interval`).
///
/// Every node variant is evaluated by one generic routine over this trait, so the two paths
/// compute the same function. Operations that can leave their domain are fallible; `tolerance`
/// is how far outside the domain an input may stray before it is rejected instead of clamped.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    fn from_f64(value: f64) -> Self;

    fn squared(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;

    fn try_div(self, rhs: Self) -> Result<Self, DomainError>;
    fn try_sqrt(self, tolerance: f64) -> Result<Self, DomainError>;
    fn try_asin(self, tolerance: f64) -> Result<Self, DomainError>;
    fn try_acos(self, tolerance: f64) -> Result<Self, DomainError>;
    fn try_ln(self) -> Result<Self, DomainError>;
    fn try_powi(self, exponent: i32) -> Result<Self, DomainError>;
    fn try_powf(self, exponent: Self) -> Result<Self, DomainError>;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn squared(self) -> Self {
        self * self
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn try_div(self, rhs: Self) -> Result<Self, DomainError> {
        if rhs == 0.0 {
            return Err(DomainError::division_by_zero(rhs, rhs));
        }
        Ok(self / rhs)
    }

    fn try_sqrt(self, tolerance: f64) -> Result<Self, DomainError> {
        if self < -tolerance {
            return Err(DomainError::out_of_domain("sqrt", self, self));
        }
        Ok(self.max(0.0).sqrt())
    }

    fn try_asin(self, tolerance: f64) -> Result<Self, DomainError> {
        if self.abs() > 1.0 + tolerance {
            return Err(DomainError::out_of_domain("asin", self, self));
        }
        Ok(self.clamp(-1.0, 1.0).asin())
    }

    fn try_acos(self, tolerance: f64) -> Result<Self, DomainError> {
        if self.abs() > 1.0 + tolerance {
            return Err(DomainError::out_of_domain("acos", self, self));
        }
        Ok(self.clamp(-1.0, 1.0).acos())
    }

    fn try_ln(self) -> Result<Self, DomainError> {
        if !(self > 0.0) {
            return Err(DomainError::out_of_domain("log", self, self));
        }
        Ok(self.ln())
    }

    fn try_powi(self, exponent: i32) -> Result<Self, DomainError> {
        if exponent < 0 && self == 0.0 {
            return Err(DomainError::division_by_zero(self, self));
        }
        Ok(self.powi(exponent))
    }

    fn try_powf(self, exponent: Self) -> Result<Self, DomainError> {
        if self < 0.0 && exponent.fract() != 0.0 {
            return Err(DomainError::out_of_domain("pow", self, self));
        }
        if self == 0.0 && exponent < 0.0 {
            return Err(DomainError::division_by_zero(self, self));
        }
        Ok(self.powf(exponent))
    }
}

impl Scalar for Interval {
    fn from_f64(value: f64) -> Self {
        Interval::singleton(value)
    }

    fn squared(self) -> Self {
        Interval::squared(self)
    }

    fn sin(self) -> Self {
        Interval::sin(self)
    }

    fn cos(self) -> Self {
        Interval::cos(self)
    }

    fn tan(self) -> Self {
        Interval::tan(self)
    }

    fn exp(self) -> Self {
        Interval::exp(self)
    }

    fn try_div(self, rhs: Self) -> Result<Self, DomainError> {
        self.checked_div(rhs)
    }

    fn try_sqrt(self, tolerance: f64) -> Result<Self, DomainError> {
        self.sqrt(tolerance)
    }

    fn try_asin(self, tolerance: f64) -> Result<Self, DomainError> {
        self.asin(tolerance)
    }

    fn try_acos(self, tolerance: f64) -> Result<Self, DomainError> {
        self.acos(tolerance)
    }

    fn try_ln(self) -> Result<Self, DomainError> {
        self.ln()
    }

    fn try_powi(self, exponent: i32) -> Result<Self, DomainError> {
        self.powi(exponent)
    }

    fn try_powf(self, exponent: Self) -> Result<Self, DomainError> {
        self.powf(exponent)
    }
}
