//! # Unit Types
//!
//! `f64` newtypes for the US customary units the sign codes are written in.
//! They serialize as bare numbers and print with their symbol. Conversions
//! between units of one dimension are `From` impls; the two products the
//! load path needs (pressure × area, force × arm) are typed.
//!
//! ## Example
//!
//! ```rust
//! use signcalc_core::units::{Feet, Inches, KipFt, KipIn};
//!
//! let height = Feet(20.0);
//! let height_in: Inches = height.into();
//! assert_eq!(height_in.0, 240.0);
//!
//! let moment: KipIn = KipFt(50.0).into();
//! assert_eq!(moment.0, 600.0);
//! assert_eq!(moment.to_string(), "600 kip-in");
//! ```

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Declare a unit newtype with its display symbol and linear arithmetic.
macro_rules! unit {
    ($(#[$doc:meta])* $name:ident, $symbol:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            pub const SYMBOL: &'static str = $symbol;

            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.0, $symbol)
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                $name(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, k: f64) -> Self {
                $name(self.0 * k)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;
            fn div(self, k: f64) -> Self {
                $name(self.0 / k)
            }
        }
    };
}

/// `1 $big = $factor $small`, both directions.
macro_rules! scale {
    ($big:ident = $factor:literal $small:ident) => {
        impl From<$big> for $small {
            fn from(v: $big) -> Self {
                $small(v.0 * $factor)
            }
        }

        impl From<$small> for $big {
            fn from(v: $small) -> Self {
                $big(v.0 / $factor)
            }
        }
    };
}

unit!(
    /// Length in feet
    Feet, "ft"
);
unit!(
    /// Length in inches (section properties, plate dimensions)
    Inches, "in"
);
unit!(
    /// Force in pounds
    Pounds, "lb"
);
unit!(
    /// Force in kips
    Kips, "kip"
);
unit!(
    /// Moment in foot-pounds
    FtLb, "lb-ft"
);
unit!(
    /// Moment at grade in kip-feet
    KipFt, "kip-ft"
);
unit!(
    /// Moment in kip-inches (section flexure)
    KipIn, "kip-in"
);
unit!(
    /// Wind pressure or soil bearing, pounds per square foot
    Psf, "psf"
);
unit!(
    /// Sign face area in square feet
    SqFt, "ft²"
);

scale!(Feet = 12.0 Inches);
scale!(Kips = 1000.0 Pounds);
scale!(KipFt = 12.0 KipIn);
scale!(KipFt = 1000.0 FtLb);

impl Mul<SqFt> for Psf {
    type Output = Pounds;
    fn mul(self, area: SqFt) -> Pounds {
        Pounds(self.0 * area.0)
    }
}

impl Mul<Feet> for Kips {
    type Output = KipFt;
    fn mul(self, arm: Feet) -> KipFt {
        KipFt(self.0 * arm.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_both_ways() {
        assert_eq!(Inches::from(Feet(10.0)), Inches(120.0));
        assert_eq!(Feet::from(Inches(30.0)), Feet(2.5));
        assert_eq!(FtLb::from(KipFt(3.5)), FtLb(3500.0));
        assert_eq!(KipFt::from(KipIn(600.0)), KipFt(50.0));
    }

    #[test]
    fn test_pressure_times_area_is_force() {
        let kips: Kips = (Psf(26.4) * SqFt(10.0)).into();
        assert!((kips.0 - 0.264).abs() < 1e-12);
    }

    #[test]
    fn test_force_times_arm_is_moment() {
        let m = Kips(2.5) * Feet(20.0);
        assert_eq!(m, KipFt(50.0));
        assert_eq!(KipIn::from(m).value(), 600.0);
    }

    #[test]
    fn test_linear_ops_and_display() {
        let total = (Feet(12.0) + Feet(8.0) - Feet(2.0)) * 2.0 / 4.0;
        assert_eq!(total, Feet(9.0));
        assert_eq!(Psf(26.5).to_string(), "26.5 psf");
        assert_eq!(SqFt::SYMBOL, "ft²");
    }

    #[test]
    fn test_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&Psf(26.42)).unwrap(), "26.42");
        assert_eq!(serde_json::from_str::<KipFt>("33.8").unwrap(), KipFt(33.8));
    }
}
