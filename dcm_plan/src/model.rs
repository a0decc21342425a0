//! RT Plan data model, trimmed to what fluence reconstruction needs.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Default)]
pub struct Sop {
    pub class_uid: String,
    pub instance_uid: String,
}

#[derive(Clone, Debug, Default)]
pub struct RtPlan {
    pub sop: Sop,
    pub label: String,
    pub name: Option<String>,
    pub fraction_groups: Vec<FractionGroup>,
    pub beams: Vec<PlanBeam>,
}

impl RtPlan {
    pub fn beam(&self, beam_number: i32) -> Option<&PlanBeam> {
        self.beams.iter().find(|b| b.beam_number == beam_number)
    }

    /// The planned meterset of a beam, taken from the fraction groups.
    pub fn beam_meterset(&self, beam_number: i32) -> Option<f64> {
        self.fraction_groups
            .iter()
            .flat_map(|g| g.referenced_beams.iter())
            .find(|r| r.referenced_beam_number == beam_number)
            .and_then(|r| r.beam_meterset)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FractionGroup {
    pub fraction_group_number: i32,
    pub referenced_beams: Vec<ReferencedBeam>,
}

#[derive(Clone, Debug, Default)]
pub struct ReferencedBeam {
    pub referenced_beam_number: i32,
    pub beam_meterset: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct PlanBeam {
    pub beam_number: i32,
    pub name: Option<String>,
    pub limiting_devices: Vec<BeamLimitingDevice>,
    pub final_cumulative_meterset_weight: f64,
    pub control_points: Vec<PlanControlPoint>,
}

impl PlanBeam {
    pub fn limiting_device(&self, device_type: LimitingDeviceType) -> Option<&BeamLimitingDevice> {
        self.limiting_devices
            .iter()
            .find(|d| d.device_type == device_type)
    }
}

/// Beam limiting device types of the RT Plan module.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LimitingDeviceType {
    #[default]
    X,
    Y,
    AsymX,
    AsymY,
    MlcX,
    MlcY,
}

impl FromStr for LimitingDeviceType {
    type Err = LimitingDeviceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "X" => Ok(LimitingDeviceType::X),
            "Y" => Ok(LimitingDeviceType::Y),
            "ASYMX" => Ok(LimitingDeviceType::AsymX),
            "ASYMY" => Ok(LimitingDeviceType::AsymY),
            "MLCX" => Ok(LimitingDeviceType::MlcX),
            "MLCY" => Ok(LimitingDeviceType::MlcY),
            t => Err(LimitingDeviceTypeError::ParseError(t.into())),
        }
    }
}

impl fmt::Display for LimitingDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitingDeviceType::X => "X",
            LimitingDeviceType::Y => "Y",
            LimitingDeviceType::AsymX => "ASYMX",
            LimitingDeviceType::AsymY => "ASYMY",
            LimitingDeviceType::MlcX => "MLCX",
            LimitingDeviceType::MlcY => "MLCY",
        };
        write!(f, "{}", s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LimitingDeviceTypeError {
    #[error("Failed to parse beam limiting device type from: {0}")]
    ParseError(String),
}

#[derive(Clone, Debug, Default)]
pub struct BeamLimitingDevice {
    pub device_type: LimitingDeviceType,
    pub number_of_leaf_jaw_pairs: i32,
    /// Leaf band boundaries in mm, length N + 1, for MLC devices.
    pub leaf_position_boundaries: Option<Vec<f64>>,
}

#[derive(Clone, Debug, Default)]
pub struct DevicePositions {
    pub device_type: LimitingDeviceType,
    /// Jaw pairs carry 2 values; MLC devices carry 2N (bank A then bank B),
    /// all in mm.
    pub positions: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct PlanControlPoint {
    pub index: i32,
    pub gantry_angle: Option<f64>,
    pub collimator_angle: Option<f64>,
    pub cumulative_meterset_weight: Option<f64>,
    pub device_positions: Vec<DevicePositions>,
}
