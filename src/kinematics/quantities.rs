//! Strongly named scalar quantities.
//!
//! Each quantity is a transparent newtype around `f64`. Arithmetic is only defined between
//! values of the same quantity and with plain scalars, so a mass cannot be passed where a
//! momentum is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Wraps `value`.
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Returns the wrapped value.
            pub const fn value(self) -> f64 {
                self.0
            }
        }

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for f64 {
            fn from(quantity: $name) -> Self {
                quantity.0
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, other: Self) -> Self {
                Self(self.0 + other.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, other: Self) {
                self.0 += other.0;
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, other: Self) -> Self {
                Self(self.0 - other.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, other: Self) {
                self.0 -= other.0;
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;

            fn mul(self, factor: f64) -> Self {
                Self(self.0 * factor)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;

            fn div(self, divisor: f64) -> Self {
                Self(self.0 / divisor)
            }
        }

        impl Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|q| q.0).sum())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

quantity!(
    /// A rest mass or an invariant mass.
    Mass
);

quantity!(
    /// An energy, for instance the kinetic energy shared among the daughters of a decay.
    Energy
);

quantity!(
    /// The magnitude of a three-momentum.
    Momentum
);

/// Breakup momentum of a two-body decay of a system with mass `a` into particles with masses
/// `b` and `c`, measured in the rest frame of the decaying system.
///
/// Kinematically forbidden combinations (`a < b + c`) return `NaN`.
pub fn breakup_momentum(a: Mass, b: Mass, c: Mass) -> Momentum {
    Momentum(pdk(a.0, b.0, c.0))
}

/// Unchecked breakup momentum on plain scalars, used in the per-event path.
#[inline]
pub(crate) fn pdk(a: f64, b: f64, c: f64) -> f64 {
    ((a - b - c) * (a + b + c) * (a - b + c) * (a + b - c)).sqrt() / (2.0 * a)
}
