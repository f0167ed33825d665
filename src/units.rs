//! This module defines the unit types used for distances and angles.
use serde::{Deserialize, Serialize};

macro_rules! unit_struct {
    ($name:ident, $suffix:literal) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        #[display("{}{}", _0, $suffix)]
        pub struct $name(pub f64);

        impl $name {
            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl std::ops::Mul<f64> for $name {
            type Output = $name;
            fn mul(self, rhs: f64) -> $name {
                $name(self.0 * rhs)
            }
        }
    };
}

unit_struct!(Metres, "m");
unit_struct!(Degrees, "°");

/// How far apart placed items must be.
///
/// Turbines are placed on an elliptical footprint (a longer separation along the axial direction
/// than across it), whereas PV plants use the same separation in every direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Separation {
    /// The same separation in every direction
    Uniform(Metres),
    /// Separation along and across the axial direction
    Axial(Metres, Metres),
}

impl std::fmt::Display for Separation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform(d) => write!(f, "{d}"),
            Self::Axial(along, across) => write!(f, "({along}, {across})"),
        }
    }
}
