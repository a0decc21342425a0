//! Trajectory log header.

use crate::axis::LogAxis;
use crate::error::{Result, TrajectoryLogError};
use linac_tools_fluence::mlc::{BoundaryMlc, Millennium120, MlcModel};
use linac_tools_fluence::scale::Scale;
use std::fmt;
use std::sync::Arc;

/// The scale axis readings were recorded in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AxisScale {
    Machine,
    ModifiedIec61217,
}

impl AxisScale {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(AxisScale::Machine),
            2 => Ok(AxisScale::ModifiedIec61217),
            c => Err(TrajectoryLogError::UnknownAxisScale(c)),
        }
    }

    /// The registry scale this log scale corresponds to.
    pub fn to_scale(&self) -> Scale {
        match self {
            AxisScale::Machine => Scale::MachineNative,
            AxisScale::ModifiedIec61217 => Scale::VarianIec,
        }
    }
}

impl fmt::Display for AxisScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AxisScale::Machine => "Machine",
            AxisScale::ModifiedIec61217 => "Modified IEC 61217",
        };
        write!(f, "{}", s)
    }
}

/// The MLC installation code recorded in the header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MlcModelCode {
    Nds80,
    Nds120,
    Nds120Hd,
}

impl MlcModelCode {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(MlcModelCode::Nds80),
            2 => Ok(MlcModelCode::Nds120),
            3 => Ok(MlcModelCode::Nds120Hd),
            c => Err(TrajectoryLogError::UnknownMlcModel(c)),
        }
    }

    pub fn leaf_pair_count(&self) -> usize {
        match self {
            MlcModelCode::Nds80 => 40,
            MlcModelCode::Nds120 | MlcModelCode::Nds120Hd => 60,
        }
    }

    /// Build the geometric model of this installation.
    pub fn build(&self) -> Arc<dyn MlcModel> {
        match self {
            MlcModelCode::Nds120 => Arc::new(Millennium120::new()),
            MlcModelCode::Nds80 => {
                // 40 uniform 10 mm pairs spanning 400 mm.
                let boundaries = uniform_boundaries(&[(40, 10.0)]);
                Arc::new(BoundaryMlc::from_boundaries("NDS 80", &boundaries).unwrap())
            }
            MlcModelCode::Nds120Hd => {
                // 14 outer 5 mm pairs per side around 32 central 2.5 mm pairs.
                let boundaries = uniform_boundaries(&[(14, 5.0), (32, 2.5), (14, 5.0)]);
                Arc::new(BoundaryMlc::from_boundaries("NDS 120 HD", &boundaries).unwrap())
            }
        }
    }
}

impl fmt::Display for MlcModelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlcModelCode::Nds80 => "NDS 80",
            MlcModelCode::Nds120 => "NDS 120",
            MlcModelCode::Nds120Hd => "NDS 120 HD",
        };
        write!(f, "{}", s)
    }
}

/// Leaf boundaries for runs of uniform widths, centred on y = 0.
fn uniform_boundaries(runs: &[(usize, f64)]) -> Vec<f64> {
    let span: f64 = runs.iter().map(|(n, w)| *n as f64 * w).sum();
    let mut boundaries = Vec::new();
    let mut y = -0.5 * span;
    boundaries.push(y);
    for (n, w) in runs {
        for _ in 0..*n {
            y += w;
            boundaries.push(y);
        }
    }
    boundaries
}

/// The fixed-size header of a trajectory log.
#[derive(Clone, Debug)]
pub struct Header {
    pub version: String,
    pub header_size: usize,
    pub sampling_interval_ms: i32,
    pub axes: Vec<LogAxis>,
    pub samples_per_axis: Vec<usize>,
    pub axis_scale: AxisScale,
    pub num_subbeams: usize,
    pub is_truncated: bool,
    pub num_snapshots: usize,
    pub mlc_model: MlcModelCode,
}

impl Header {
    /// Position of `axis` in the per-snapshot sample layout, when sampled.
    pub fn axis_index(&self, axis: LogAxis) -> Option<usize> {
        self.axes.iter().position(|a| *a == axis)
    }

    /// Total scalar samples in one snapshot, over all axes.
    pub fn samples_per_snapshot(&self) -> usize {
        self.samples_per_axis.iter().sum()
    }

    /// Sample offset of `axis` within one snapshot.
    pub fn axis_offset(&self, axis: LogAxis) -> Option<usize> {
        let idx = self.axis_index(axis)?;
        Some(self.samples_per_axis[..idx].iter().sum())
    }
}
