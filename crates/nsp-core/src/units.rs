//! Unit newtypes for distribution-grid quantities.
//!
//! Forecasts arrive in kilowatts, bases in kilovolts and kilovolt-amperes, and results leave in
//! kilovolts, amperes and degrees. Keeping each behind its own newtype means a kV value cannot be
//! added to a kVA value, and the per-unit boundary is always an explicit conversion.
//!
//! # Usage
//!
//! ```
//! use nsp_core::units::{Kilovolts, PerUnit, Radians};
//!
//! let base = Kilovolts(20.0);
//! let v = PerUnit(1.02).to_kilovolts(base);
//! assert!((v.value() - 20.4).abs() < 1e-12);
//!
//! let angle = Radians(std::f64::consts::PI).to_degrees();
//! assert!((angle.value() - 180.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Implements arithmetic, display and a few helpers for a unit newtype
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power Units
// =============================================================================

/// Real power in kilowatts (kW)
///
/// Resource forecasts use the load convention: consumption is negative, production positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

/// Apparent power in kilovolt-amperes (kVA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct KilovoltAmperes(pub f64);

impl_unit_ops!(KilovoltAmperes, "kVA");

impl Kilowatts {
    /// Express this power on the given apparent-power base
    #[inline]
    pub fn to_per_unit(self, base: KilovoltAmperes) -> PerUnit {
        PerUnit(self.0 / base.0)
    }
}

// =============================================================================
// Voltage Units
// =============================================================================

/// Dimensionless per-unit value
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl PerUnit {
    /// Convert to kilovolts given base voltage
    #[inline]
    pub fn to_kilovolts(self, base_kv: Kilovolts) -> Kilovolts {
        Kilovolts(self.0 * base_kv.0)
    }

    /// Convert to amperes given base current
    #[inline]
    pub fn to_amperes(self, base: Amperes) -> Amperes {
        Amperes(self.0 * base.0)
    }

    /// Convert to kilowatts given apparent-power base
    #[inline]
    pub fn to_kilowatts(self, base: KilovoltAmperes) -> Kilowatts {
        Kilowatts(self.0 * base.0)
    }

    pub const ONE: Self = Self(1.0);

    pub const ZERO: Self = Self(0.0);
}

impl Kilovolts {
    /// Convert to per-unit given base voltage
    #[inline]
    pub fn to_per_unit(self, base_kv: Kilovolts) -> PerUnit {
        if base_kv.0.abs() < 1e-12 {
            PerUnit(0.0)
        } else {
            PerUnit(self.0 / base_kv.0)
        }
    }
}

// =============================================================================
// Current and Impedance Units
// =============================================================================

/// Current in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

impl Amperes {
    /// Convert to per-unit given base current
    #[inline]
    pub fn to_per_unit(self, base: Amperes) -> PerUnit {
        if base.0.abs() < 1e-12 {
            PerUnit(0.0)
        } else {
            PerUnit(self.0 / base.0)
        }
    }
}

/// Impedance in ohms (Ω)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_unit_ops!(Ohms, "Ω");

// =============================================================================
// Angle Units
// =============================================================================

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees
///
/// All published angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }

    pub const ZERO: Self = Self(0.0);
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }

    pub const ZERO: Self = Self(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kilowatts_arithmetic() {
        let p1 = Kilowatts(100.0);
        let p2 = Kilowatts(50.0);

        assert_eq!((p1 + p2).value(), 150.0);
        assert_eq!((p1 - p2).value(), 50.0);
        assert_eq!((-p1).value(), -100.0);
        assert_eq!((p1 * 2.0).value(), 200.0);
        assert_eq!((p1 / 2.0).value(), 50.0);
        assert_eq!(p1 / p2, 2.0);
    }

    #[test]
    fn test_power_per_unit_round_trip() {
        let base = KilovoltAmperes(10_000.0);
        let p = Kilowatts(-125.0);
        let pu = p.to_per_unit(base);

        assert!((pu.value() + 0.0125).abs() < 1e-15);
        assert!((pu.to_kilowatts(base).value() - p.value()).abs() < 1e-12);
    }

    #[test]
    fn test_voltage_conversion() {
        let base_kv = Kilovolts(20.0);
        let v_kv = PerUnit(1.02).to_kilovolts(base_kv);

        assert!((v_kv.value() - 20.4).abs() < 1e-10);
        assert!((v_kv.to_per_unit(base_kv).value() - 1.02).abs() < 1e-12);
        assert_eq!(Kilovolts(1.0).to_per_unit(Kilovolts(0.0)), PerUnit::ZERO);
    }

    #[test]
    fn test_current_conversion() {
        let base = Amperes(288.675);
        let i = Amperes(57.735);

        let back = i.to_per_unit(base).to_amperes(base);
        assert!((back.value() - i.value()).abs() < 1e-12);
    }

    #[test]
    fn test_angle_conversion() {
        let rad = Degrees(240.0).to_radians();

        assert!((rad.value() - 4.0 * std::f64::consts::FRAC_PI_3).abs() < 1e-12);
        assert!((rad.to_degrees().value() - 240.0).abs() < 1e-10);
    }

    #[test]
    fn test_sum_iterator() {
        let total: Kilowatts = vec![Kilowatts(10.0), Kilowatts(-20.0), Kilowatts(30.0)]
            .into_iter()
            .sum();

        assert_eq!(total.value(), 20.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kilowatts(100.0)), "100.0000 kW");
        assert_eq!(format!("{}", Degrees(45.0)), "45.0000 °");
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
    }
}
