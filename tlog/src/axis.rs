//! Axes sampled by a trajectory log.

use crate::error::{Result, TrajectoryLogError};
use linac_tools_fluence::scale::Axis;
use std::fmt;

/// An axis as enumerated in the log header. The numeric codes are fixed by
/// the log format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogAxis {
    CollRtn,
    GantryRtn,
    Y1,
    Y2,
    X1,
    X2,
    CouchVrt,
    CouchLng,
    CouchLat,
    CouchRtn,
    CouchPit,
    CouchRol,
    Mu,
    BeamHold,
    ControlPoint,
    Mlc,
}

impl LogAxis {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(LogAxis::CollRtn),
            1 => Ok(LogAxis::GantryRtn),
            2 => Ok(LogAxis::Y1),
            3 => Ok(LogAxis::Y2),
            4 => Ok(LogAxis::X1),
            5 => Ok(LogAxis::X2),
            6 => Ok(LogAxis::CouchVrt),
            7 => Ok(LogAxis::CouchLng),
            8 => Ok(LogAxis::CouchLat),
            9 => Ok(LogAxis::CouchRtn),
            10 => Ok(LogAxis::CouchPit),
            11 => Ok(LogAxis::CouchRol),
            40 => Ok(LogAxis::Mu),
            41 => Ok(LogAxis::BeamHold),
            42 => Ok(LogAxis::ControlPoint),
            50 => Ok(LogAxis::Mlc),
            c => Err(TrajectoryLogError::UnknownAxis(c)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            LogAxis::CollRtn => 0,
            LogAxis::GantryRtn => 1,
            LogAxis::Y1 => 2,
            LogAxis::Y2 => 3,
            LogAxis::X1 => 4,
            LogAxis::X2 => 5,
            LogAxis::CouchVrt => 6,
            LogAxis::CouchLng => 7,
            LogAxis::CouchLat => 8,
            LogAxis::CouchRtn => 9,
            LogAxis::CouchPit => 10,
            LogAxis::CouchRol => 11,
            LogAxis::Mu => 40,
            LogAxis::BeamHold => 41,
            LogAxis::ControlPoint => 42,
            LogAxis::Mlc => 50,
        }
    }

    /// The scale-registry axis this log axis converts through, when it is a
    /// scalar machine axis.
    pub fn scale_axis(&self) -> Option<Axis> {
        match self {
            LogAxis::CollRtn => Some(Axis::CollRtn),
            LogAxis::GantryRtn => Some(Axis::GantryRtn),
            LogAxis::Y1 => Some(Axis::Y1),
            LogAxis::Y2 => Some(Axis::Y2),
            LogAxis::X1 => Some(Axis::X1),
            LogAxis::X2 => Some(Axis::X2),
            LogAxis::CouchVrt => Some(Axis::CouchVrt),
            LogAxis::CouchLng => Some(Axis::CouchLng),
            LogAxis::CouchLat => Some(Axis::CouchLat),
            LogAxis::CouchRtn => Some(Axis::CouchRtn),
            LogAxis::CouchPit => Some(Axis::CouchPit),
            LogAxis::CouchRol => Some(Axis::CouchRol),
            LogAxis::Mu => Some(Axis::Mu),
            LogAxis::BeamHold => Some(Axis::BeamHold),
            LogAxis::ControlPoint => Some(Axis::ControlPoint),
            LogAxis::Mlc => None,
        }
    }
}

impl fmt::Display for LogAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogAxis::CollRtn => "Coll Rtn",
            LogAxis::GantryRtn => "Gantry Rtn",
            LogAxis::Y1 => "Y1",
            LogAxis::Y2 => "Y2",
            LogAxis::X1 => "X1",
            LogAxis::X2 => "X2",
            LogAxis::CouchVrt => "Couch Vrt",
            LogAxis::CouchLng => "Couch Lng",
            LogAxis::CouchLat => "Couch Lat",
            LogAxis::CouchRtn => "Couch Rtn",
            LogAxis::CouchPit => "Couch Pit",
            LogAxis::CouchRol => "Couch Rol",
            LogAxis::Mu => "MU",
            LogAxis::BeamHold => "Beam Hold",
            LogAxis::ControlPoint => "Control Point",
            LogAxis::Mlc => "MLC",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_round_trip() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 40, 41, 42, 50] {
            let axis = LogAxis::from_code(code).unwrap();
            assert_eq!(axis.code(), code);
        }
    }

    #[test]
    fn unknown_code_fails() {
        assert!(matches!(
            LogAxis::from_code(13),
            Err(TrajectoryLogError::UnknownAxis(13))
        ));
    }
}
