//! Elliptic curve points
//!
//! Points on a short Weierstrass curve y² = x³ + ax + b, generic over the
//! coordinate arithmetic. The same addition law serves secp256k1 and the small
//! curves used in tests.

use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

use super::field::{FieldError, FieldInteger};

/// Errors produced by point construction and arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointError {
    #[error("Point is not on the curve")]
    NotOnCurve,
    #[error("Points are not on the same curve")]
    CurveMismatch,
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
}

/// A curve point; `coords == None` is the point at infinity
#[derive(Debug, Clone, PartialEq)]
pub struct Point<F: FieldInteger> {
    coords: Option<(F, F)>,
    a: F,
    b: F,
}

impl<F: FieldInteger> Point<F> {
    /// Create a point, checking that it lies on the curve
    pub fn new(x: F, y: F, a: F, b: F) -> Result<Self, PointError> {
        let lhs = y.pow(2);
        let rhs = x.pow(3).add(&a.mul(&x)?)?.add(&b)?;
        if lhs != rhs {
            return Err(PointError::NotOnCurve);
        }
        Ok(Self {
            coords: Some((x, y)),
            a,
            b,
        })
    }

    /// Create a point whose coordinates are already known to be on the curve
    pub(crate) fn from_affine_unchecked(x: F, y: F, a: F, b: F) -> Self {
        Self {
            coords: Some((x, y)),
            a,
            b,
        }
    }

    /// The point at infinity on the curve with coefficients `a` and `b`
    pub fn infinity(a: F, b: F) -> Self {
        Self { coords: None, a, b }
    }

    pub fn is_infinity(&self) -> bool {
        self.coords.is_none()
    }

    pub fn x(&self) -> Option<&F> {
        self.coords.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&F> {
        self.coords.as_ref().map(|(_, y)| y)
    }

    pub fn a(&self) -> &F {
        &self.a
    }

    pub fn b(&self) -> &F {
        &self.b
    }

    fn same_curve(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b
    }

    /// Reflect across the x axis: (x, -y)
    pub fn neg(&self) -> Self {
        Self {
            coords: self.coords.as_ref().map(|(x, y)| (x.clone(), y.neg())),
            a: self.a.clone(),
            b: self.b.clone(),
        }
    }

    /// Group addition
    pub fn add(&self, other: &Self) -> Result<Self, PointError> {
        if !self.same_curve(other) {
            return Err(PointError::CurveMismatch);
        }

        let ((x1, y1), (x2, y2)) = match (&self.coords, &other.coords) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(p), Some(q)) => (p, q),
        };

        // Vertical line: P + (-P)
        if x1 == x2 && y1 != y2 {
            return Ok(Self::infinity(self.a.clone(), self.b.clone()));
        }

        let slope = if x1 != x2 {
            y2.sub(y1)?.div(&x2.sub(x1)?)?
        } else {
            // Tangent is vertical
            if y1.is_zero() {
                return Ok(Self::infinity(self.a.clone(), self.b.clone()));
            }
            x1.pow(2).scale(3).add(&self.a)?.div(&y1.scale(2))?
        };

        let x3 = slope.pow(2).sub(x1)?.sub(x2)?;
        let y3 = slope.mul(&x1.sub(&x3)?)?.sub(y1)?;

        Ok(Self {
            coords: Some((x3, y3)),
            a: self.a.clone(),
            b: self.b.clone(),
        })
    }

    /// Scalar multiplication by double-and-add.
    ///
    /// The coefficient is used as given; curves with a known group order
    /// reduce it before calling this.
    pub fn scale(&self, coefficient: &BigUint) -> Result<Self, PointError> {
        let mut current = self.clone();
        let mut result = Self::infinity(self.a.clone(), self.b.clone());
        for bit in 0..coefficient.bits() {
            if coefficient.bit(bit) {
                result = result.add(&current)?;
            }
            current = current.add(&current)?;
        }
        Ok(result)
    }
}

impl<F: FieldInteger + fmt::Display> fmt::Display for Point<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coords {
            None => write!(f, "Point(infinity)"),
            Some((x, y)) => write!(f, "Point({},{})_{}_{}", x, y, self.a, self.b),
        }
    }
}
