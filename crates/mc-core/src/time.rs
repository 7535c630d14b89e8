//! Fixed-precision points on the periodic interval `[0, beta)`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Largest tick; the tick space is the cyclic group of order `MAX_TICK + 1 = 2^64`.
pub const MAX_TICK: u64 = u64::MAX;

/// A point on a very thin grid over `[0, beta)`, stored as an integer tick.
///
/// Equality and ordering compare ticks only, so operator-ordering decisions never depend on
/// floating point rounding. Addition and subtraction wrap modulo `2^64`. Arithmetic with a
/// plain `f64` goes through the cached floating value and yields an `f64`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimePoint {
    n: u64,
    beta: f64,
    val: f64,
}

impl TimePoint {
    /// Rounds `value / beta` to the nearest tick. Values are expected in `[0, beta)`;
    /// anything outside saturates at the ends of the grid.
    pub fn new(value: f64, beta: f64) -> Self {
        let n = ((value / beta) * MAX_TICK as f64).round() as u64;
        Self {
            n,
            beta,
            val: value,
        }
    }

    /// Builds the point at tick `n`, deriving the floating value from the tick.
    pub fn from_ticks(n: u64, beta: f64) -> Self {
        Self {
            n,
            beta,
            val: beta * (n as f64 / MAX_TICK as f64),
        }
    }

    /// Tick 0.
    pub fn zero(beta: f64) -> Self {
        Self::from_ticks(0, beta)
    }

    /// Smallest positive point (tick 1).
    pub fn epsilon(beta: f64) -> Self {
        Self::from_ticks(1, beta)
    }

    /// Largest representable point.
    pub fn max(beta: f64) -> Self {
        Self::from_ticks(MAX_TICK, beta)
    }

    /// Raw tick.
    pub fn ticks(&self) -> u64 {
        self.n
    }

    /// Period of the interval.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Cached floating value.
    pub fn value(&self) -> f64 {
        self.val
    }
}

impl Default for TimePoint {
    fn default() -> Self {
        Self::zero(1.0)
    }
}

impl PartialEq for TimePoint {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n
    }
}

impl Eq for TimePoint {}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.n.cmp(&other.n)
    }
}

impl Hash for TimePoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.n.hash(state);
    }
}

impl Add for TimePoint {
    type Output = TimePoint;

    fn add(self, rhs: TimePoint) -> TimePoint {
        debug_assert_eq!(self.beta, rhs.beta, "time points on different intervals");
        TimePoint::from_ticks(self.n.wrapping_add(rhs.n), self.beta)
    }
}

impl Sub for TimePoint {
    type Output = TimePoint;

    fn sub(self, rhs: TimePoint) -> TimePoint {
        debug_assert_eq!(self.beta, rhs.beta, "time points on different intervals");
        TimePoint::from_ticks(self.n.wrapping_sub(rhs.n), self.beta)
    }
}

impl Neg for TimePoint {
    type Output = TimePoint;

    fn neg(self) -> TimePoint {
        TimePoint::from_ticks(self.n.wrapping_neg(), self.beta)
    }
}

impl From<TimePoint> for f64 {
    fn from(point: TimePoint) -> f64 {
        point.val
    }
}

macro_rules! float_ops {
    ($($trait:ident :: $method:ident),*) => {
        $(
            impl $trait<f64> for TimePoint {
                type Output = f64;

                fn $method(self, rhs: f64) -> f64 {
                    self.val.$method(rhs)
                }
            }

            impl $trait<TimePoint> for f64 {
                type Output = f64;

                fn $method(self, rhs: TimePoint) -> f64 {
                    self.$method(rhs.val)
                }
            }
        )*
    };
}

float_ops!(Add::add, Sub::sub, Mul::mul, Div::div);

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [beta = {}, tick = {}]", self.val, self.beta, self.n)
    }
}
