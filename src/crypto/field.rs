//! Finite field arithmetic
//!
//! `FieldInteger` is the arithmetic a curve needs from its coordinates.
//! `FieldElement` implements it over a prime field with big integers; the
//! point code in `point.rs` is generic over the trait so small test curves and
//! secp256k1 run through the same addition law.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::fmt;
use thiserror::Error;

/// Errors produced by field arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Value {value} is not in field range 0 to {prime}")]
    OutOfRange { value: BigUint, prime: BigUint },
    #[error("Cannot combine elements of different fields ({left} and {right})")]
    IncompatibleField { left: BigUint, right: BigUint },
    #[error("Division by zero")]
    DivisionByZero,
}

/// Arithmetic required of a curve coordinate.
///
/// Binary operations are fallible because two operands may come from
/// different fields.
pub trait FieldInteger: Clone + PartialEq + fmt::Debug {
    fn add(&self, rhs: &Self) -> Result<Self, FieldError>;
    fn sub(&self, rhs: &Self) -> Result<Self, FieldError>;
    fn mul(&self, rhs: &Self) -> Result<Self, FieldError>;
    fn div(&self, rhs: &Self) -> Result<Self, FieldError>;
    fn pow(&self, exponent: u32) -> Self;
    /// Multiply by a small integer constant (the 2 and 3 of the doubling law)
    fn scale(&self, coefficient: u32) -> Self;
    fn neg(&self) -> Self;
    fn is_zero(&self) -> bool;
}

/// An element of the prime field F_p
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    value: BigUint,
    prime: BigUint,
}

impl FieldElement {
    /// Create an element, rejecting values outside `[0, prime)`
    pub fn new(value: BigUint, prime: BigUint) -> Result<Self, FieldError> {
        if value >= prime {
            return Err(FieldError::OutOfRange { value, prime });
        }
        Ok(Self { value, prime })
    }

    /// Create an element from a value of any size, reducing it into the field
    pub(crate) fn reduced(value: BigUint, prime: BigUint) -> Self {
        Self {
            value: value % &prime,
            prime,
        }
    }

    pub fn from_u64(value: u64, prime: u64) -> Result<Self, FieldError> {
        Self::new(BigUint::from(value), BigUint::from(prime))
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    fn check_field(&self, rhs: &Self) -> Result<(), FieldError> {
        if self.prime != rhs.prime {
            return Err(FieldError::IncompatibleField {
                left: self.prime.clone(),
                right: rhs.prime.clone(),
            });
        }
        Ok(())
    }

    fn with_value(&self, value: BigUint) -> Self {
        Self {
            value,
            prime: self.prime.clone(),
        }
    }

    /// Raise to a signed exponent.
    ///
    /// The exponent is reduced mod p-1 (Fermat), so negative exponents become
    /// inverses.
    pub fn pow_big(&self, exponent: &BigInt) -> Self {
        let order = BigInt::from_biguint(Sign::Plus, &self.prime - BigUint::one());
        if order.is_zero() {
            return self.clone();
        }
        let reduced = ((exponent % &order) + &order) % &order;
        self.with_value(self.value.modpow(reduced.magnitude(), &self.prime))
    }

    /// Square root for primes where p % 4 == 3.
    ///
    /// Returns one of the two roots; the other is `p - root`. The result is
    /// only meaningful when the element is a quadratic residue.
    pub fn sqrt(&self) -> Self {
        let exponent = (&self.prime + BigUint::one()) >> 2;
        self.with_value(self.value.modpow(&exponent, &self.prime))
    }

    /// The multiplicative inverse via a^(p-2)
    pub fn inverse(&self) -> Result<Self, FieldError> {
        if self.value.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        let exponent = &self.prime - BigUint::from(2u32);
        Ok(self.with_value(self.value.modpow(&exponent, &self.prime)))
    }
}

impl FieldInteger for FieldElement {
    fn add(&self, rhs: &Self) -> Result<Self, FieldError> {
        self.check_field(rhs)?;
        Ok(self.with_value((&self.value + &rhs.value) % &self.prime))
    }

    fn sub(&self, rhs: &Self) -> Result<Self, FieldError> {
        self.check_field(rhs)?;
        // BigUint cannot go negative, so add p before subtracting
        Ok(self.with_value((&self.value + &self.prime - &rhs.value) % &self.prime))
    }

    fn mul(&self, rhs: &Self) -> Result<Self, FieldError> {
        self.check_field(rhs)?;
        Ok(self.with_value((&self.value * &rhs.value) % &self.prime))
    }

    fn div(&self, rhs: &Self) -> Result<Self, FieldError> {
        self.check_field(rhs)?;
        let inverse = rhs.inverse()?;
        self.mul(&inverse)
    }

    fn pow(&self, exponent: u32) -> Self {
        self.pow_big(&BigInt::from(exponent))
    }

    fn scale(&self, coefficient: u32) -> Self {
        self.with_value((&self.value * BigUint::from(coefficient)) % &self.prime)
    }

    fn neg(&self) -> Self {
        if self.value.is_zero() {
            return self.clone();
        }
        self.with_value(&self.prime - &self.value)
    }

    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.value)
    }
}
