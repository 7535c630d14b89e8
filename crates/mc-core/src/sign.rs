//! Scalar abstraction for the running importance-sampling sign.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul};

use num_complex::Complex64;
use num_traits::{One, Zero};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Real or complex weight carried by the Markov chain.
///
/// Implemented for `f64` and `Complex64`. The flat encoding returned by [`Sign::to_parts`]
/// is what the cross-worker SUM reductions operate on.
pub trait Sign:
    Copy
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Serialize
    + DeserializeOwned
    + Send
    + 'static
{
    /// Number of `f64` components in the flat encoding.
    const PARTS: usize;

    /// Absolute value `|r|`.
    fn magnitude(&self) -> f64;

    /// True when every component is finite.
    fn is_finite(&self) -> bool;

    /// Multiplies by a real factor.
    fn scale(self, factor: f64) -> Self;

    /// Flat component encoding.
    fn to_parts(&self) -> Vec<f64>;

    /// Inverse of [`Sign::to_parts`]; missing components read as zero.
    fn from_parts(parts: &[f64]) -> Self;

    /// `r / |r|`, or zero when `|r|` is zero.
    fn phase(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            Self::zero()
        } else {
            self.scale(1.0 / magnitude)
        }
    }
}

impl Sign for f64 {
    const PARTS: usize = 1;

    fn magnitude(&self) -> f64 {
        self.abs()
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn to_parts(&self) -> Vec<f64> {
        vec![*self]
    }

    fn from_parts(parts: &[f64]) -> Self {
        parts.first().copied().unwrap_or(0.0)
    }
}

impl Sign for Complex64 {
    const PARTS: usize = 2;

    fn magnitude(&self) -> f64 {
        self.norm()
    }

    fn is_finite(&self) -> bool {
        Complex64::is_finite(*self)
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn to_parts(&self) -> Vec<f64> {
        vec![self.re, self.im]
    }

    fn from_parts(parts: &[f64]) -> Self {
        Complex64::new(
            parts.first().copied().unwrap_or(0.0),
            parts.get(1).copied().unwrap_or(0.0),
        )
    }
}
