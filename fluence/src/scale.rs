//! Axis scale conversions.
//!
//! Every geometric computation in this crate is carried out in IEC 61217,
//! which acts as the pivot frame: converting between two arbitrary scales
//! goes through IEC. Converters are pluggable through [`ScaleConverter`] and
//! looked up in an explicit [`ScaleRegistry`] value, so tests can inject
//! alternates.

use crate::error::{FluenceError, Result};
use std::fmt;

/// A machine axis whose readings can be converted between scales.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    GantryRtn,
    CollRtn,
    X1,
    X2,
    Y1,
    Y2,
    CouchVrt,
    CouchLng,
    CouchLat,
    CouchRtn,
    CouchPit,
    CouchRol,
    Mu,
    BeamHold,
    ControlPoint,
}

impl Axis {
    /// Rotational axes wrap at 360 degrees and use angular delta rules.
    pub fn is_rotational(&self) -> bool {
        matches!(
            self,
            Axis::GantryRtn | Axis::CollRtn | Axis::CouchRtn | Axis::CouchPit | Axis::CouchRol
        )
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::GantryRtn => "Gantry Rtn",
            Axis::CollRtn => "Coll Rtn",
            Axis::X1 => "X1",
            Axis::X2 => "X2",
            Axis::Y1 => "Y1",
            Axis::Y2 => "Y2",
            Axis::CouchVrt => "Couch Vrt",
            Axis::CouchLng => "Couch Lng",
            Axis::CouchLat => "Couch Lat",
            Axis::CouchRtn => "Couch Rtn",
            Axis::CouchPit => "Couch Pit",
            Axis::CouchRol => "Couch Rol",
            Axis::Mu => "MU",
            Axis::BeamHold => "Beam Hold",
            Axis::ControlPoint => "Control Point",
        };
        write!(f, "{}", s)
    }
}

/// The coordinate scales understood by the default registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scale {
    MachineNative,
    MachineIsocentric,
    VarianIec,
    Iec61217,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scale::MachineNative => "Machine Native",
            Scale::MachineIsocentric => "Machine Isocentric",
            Scale::VarianIec => "Varian IEC",
            Scale::Iec61217 => "IEC 61217",
        };
        write!(f, "{}", s)
    }
}

/// An MLC bank. Bank A is index 0; bank B is index 1 and is the bank whose
/// positions are sign-flipped relative to IEC 61217 in machine scales. The
/// same order is used by every adapter in the workspace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Bank {
    A,
    B,
}

impl Bank {
    pub fn index(&self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bank::A => write!(f, "A"),
            Bank::B => write!(f, "B"),
        }
    }
}

/// Converts axis readings of one scale to and from IEC 61217.
pub trait ScaleConverter: Send + Sync {
    fn scale(&self) -> Scale;
    fn to_iec(&self, axis: Axis, value: f64) -> f64;
    fn from_iec(&self, axis: Axis, value: f64) -> f64;
    /// MLC leaf position variant, parametrised by bank.
    fn leaf_to_iec(&self, bank: Bank, value: f64) -> f64;
    fn leaf_from_iec(&self, bank: Bank, value: f64) -> f64;
}

/// Normalise an angle into [0, 360).
pub fn normalize_360(v: f64) -> f64 {
    let r = v % 360.0;
    if r < 0.0 { r + 360.0 } else { r }
}

/// Normalise an angular difference into (-180, 180].
pub fn normalize_180(v: f64) -> f64 {
    let r = normalize_360(v);
    if r > 180.0 { r - 360.0 } else { r }
}

/// Varian machine-native scale.
#[derive(Copy, Clone, Debug, Default)]
pub struct MachineNativeScale;

impl ScaleConverter for MachineNativeScale {
    fn scale(&self) -> Scale {
        Scale::MachineNative
    }

    fn to_iec(&self, axis: Axis, value: f64) -> f64 {
        match axis {
            a if a.is_rotational() => normalize_360(180.0 - value),
            Axis::X1 | Axis::Y1 => -value,
            Axis::CouchVrt | Axis::CouchLat => value - 100.0,
            _ => value,
        }
    }

    fn from_iec(&self, axis: Axis, value: f64) -> f64 {
        match axis {
            a if a.is_rotational() => normalize_360(180.0 - value),
            Axis::X1 | Axis::Y1 => -value,
            Axis::CouchVrt | Axis::CouchLat => value + 100.0,
            _ => value,
        }
    }

    fn leaf_to_iec(&self, bank: Bank, value: f64) -> f64 {
        match bank {
            Bank::A => value,
            Bank::B => -value,
        }
    }

    fn leaf_from_iec(&self, bank: Bank, value: f64) -> f64 {
        self.leaf_to_iec(bank, value)
    }
}

/// Machine-native scale with couch translations already referenced to the
/// isocentre. Rotational axes and jaw signs behave like the machine-native
/// scale; translations map through unchanged.
#[derive(Copy, Clone, Debug, Default)]
pub struct MachineIsocentricScale;

impl ScaleConverter for MachineIsocentricScale {
    fn scale(&self) -> Scale {
        Scale::MachineIsocentric
    }

    fn to_iec(&self, axis: Axis, value: f64) -> f64 {
        match axis {
            a if a.is_rotational() => normalize_360(180.0 - value),
            Axis::X1 | Axis::Y1 => -value,
            _ => value,
        }
    }

    fn from_iec(&self, axis: Axis, value: f64) -> f64 {
        self.to_iec(axis, value)
    }

    fn leaf_to_iec(&self, bank: Bank, value: f64) -> f64 {
        match bank {
            Bank::A => value,
            Bank::B => -value,
        }
    }

    fn leaf_from_iec(&self, bank: Bank, value: f64) -> f64 {
        self.leaf_to_iec(bank, value)
    }
}

/// Varian "modified IEC" scale: IEC 61217 except for the couch rotation
/// direction, the X1/Y1 jaw signs and the wrapped couch translations.
/// Couch vertical wraps at 1000 (range (-1000, 1000]); couch lateral wraps
/// at 500 (range (-500, 500]).
#[derive(Copy, Clone, Debug, Default)]
pub struct VarianIecScale;

impl ScaleConverter for VarianIecScale {
    fn scale(&self) -> Scale {
        Scale::VarianIec
    }

    fn to_iec(&self, axis: Axis, value: f64) -> f64 {
        match axis {
            Axis::CouchRtn => normalize_360(360.0 - value),
            Axis::X1 | Axis::Y1 => -value,
            Axis::CouchVrt => {
                if value > 1000.0 {
                    value - 2000.0
                } else {
                    value
                }
            }
            Axis::CouchLat => {
                if value > 500.0 {
                    value - 1000.0
                } else {
                    value
                }
            }
            _ => value,
        }
    }

    fn from_iec(&self, axis: Axis, value: f64) -> f64 {
        match axis {
            Axis::CouchRtn => normalize_360(360.0 - value),
            Axis::X1 | Axis::Y1 => -value,
            Axis::CouchVrt => {
                if value < 0.0 {
                    value + 2000.0
                } else {
                    value
                }
            }
            Axis::CouchLat => {
                if value < 0.0 {
                    value + 1000.0
                } else {
                    value
                }
            }
            _ => value,
        }
    }

    fn leaf_to_iec(&self, bank: Bank, value: f64) -> f64 {
        match bank {
            Bank::A => value,
            Bank::B => -value,
        }
    }

    fn leaf_from_iec(&self, bank: Bank, value: f64) -> f64 {
        self.leaf_to_iec(bank, value)
    }
}

/// The identity converter for the canonical frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct Iec61217Scale;

impl ScaleConverter for Iec61217Scale {
    fn scale(&self) -> Scale {
        Scale::Iec61217
    }

    fn to_iec(&self, _axis: Axis, value: f64) -> f64 {
        value
    }

    fn from_iec(&self, _axis: Axis, value: f64) -> f64 {
        value
    }

    fn leaf_to_iec(&self, _bank: Bank, value: f64) -> f64 {
        value
    }

    fn leaf_from_iec(&self, _bank: Bank, value: f64) -> f64 {
        value
    }
}

/// Registry of scale converters. Not process-wide: an explicit value owned by
/// whoever loads machine data.
pub struct ScaleRegistry {
    converters: Vec<Box<dyn ScaleConverter>>,
}

impl Default for ScaleRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ScaleRegistry {
    /// An empty registry, for tests that inject their own converters.
    pub fn empty() -> Self {
        Self { converters: vec![] }
    }

    /// A registry holding the four built-in converters.
    pub fn with_defaults() -> Self {
        Self {
            converters: vec![
                Box::new(MachineNativeScale),
                Box::new(MachineIsocentricScale),
                Box::new(VarianIecScale),
                Box::new(Iec61217Scale),
            ],
        }
    }

    pub fn register(&mut self, converter: Box<dyn ScaleConverter>) {
        self.converters.push(converter);
    }

    fn converter(&self, scale: Scale) -> Option<&dyn ScaleConverter> {
        self.converters
            .iter()
            .find(|c| c.scale() == scale)
            .map(|c| c.as_ref())
    }

    fn converter_or_err(&self, from: Scale, to: Scale, scale: Scale) -> Result<&dyn ScaleConverter> {
        self.converter(scale)
            .ok_or(FluenceError::UnsupportedScaleConversion { from, to })
    }

    /// Convert an axis value between two registered scales, through IEC.
    pub fn convert(&self, from: Scale, to: Scale, axis: Axis, value: f64) -> Result<f64> {
        let src = self.converter_or_err(from, to, from)?;
        let dst = self.converter_or_err(from, to, to)?;
        Ok(dst.from_iec(axis, src.to_iec(axis, value)))
    }

    pub fn to_iec(&self, from: Scale, axis: Axis, value: f64) -> Result<f64> {
        let src = self.converter_or_err(from, Scale::Iec61217, from)?;
        Ok(src.to_iec(axis, value))
    }

    pub fn from_iec(&self, to: Scale, axis: Axis, value: f64) -> Result<f64> {
        let dst = self.converter_or_err(Scale::Iec61217, to, to)?;
        Ok(dst.from_iec(axis, value))
    }

    pub fn leaf_to_iec(&self, from: Scale, bank: Bank, value: f64) -> Result<f64> {
        let src = self.converter_or_err(from, Scale::Iec61217, from)?;
        Ok(src.leaf_to_iec(bank, value))
    }

    pub fn leaf_from_iec(&self, to: Scale, bank: Bank, value: f64) -> Result<f64> {
        let dst = self.converter_or_err(Scale::Iec61217, to, to)?;
        Ok(dst.leaf_from_iec(bank, value))
    }

    /// Difference `to - from` of two readings on `scale`, computed in IEC.
    /// For rotational axes the result is normalised into (-180, 180].
    pub fn delta(&self, scale: Scale, axis: Axis, from: f64, to: f64) -> Result<f64> {
        let a = self.to_iec(scale, axis, from)?;
        let b = self.to_iec(scale, axis, to)?;
        let d = b - a;
        if axis.is_rotational() {
            Ok(normalize_180(d))
        } else {
            Ok(d)
        }
    }
}
