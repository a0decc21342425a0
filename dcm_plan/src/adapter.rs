//! Field data adapter over a planned DICOM beam.
//!
//! DICOM control points are sparse: the first carries the full machine
//! state, later ones only what changed. The adapter first resolves every
//! control point into a complete state, then synthesises intermediate
//! frames by linear interpolation at a fractional step `cp_delta`, so the
//! integrator sees a stream dense enough for dynamic deliveries.

use crate::model::{LimitingDeviceType, PlanBeam};
use linac_tools_fluence::mlc::{BoundaryMlc, MlcModel};
use linac_tools_fluence::sample::{FieldSample, FluenceSource};
use linac_tools_fluence::{FluenceError, Result as FluenceResult};
use std::sync::Arc;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum PlanAdapterError {
    #[error("Beam {0} has no control points")]
    NoControlPoints(i32),
    #[error("Beam {0} has no MLCX device with leaf position boundaries")]
    MissingMlcBoundaries(i32),
    #[error("MLCX positions carry {got} values, expected {expected}")]
    MlcPositionCount { got: usize, expected: usize },
    #[error("Control point step must lie in (0, 1], got {0}")]
    InvalidCpDelta(f64),
    #[error(transparent)]
    InvalidMlc(#[from] FluenceError),
}

/// One fully resolved control point state, in cm and degrees IEC 61217.
#[derive(Clone, Debug, Default)]
struct CpState {
    gantry: f64,
    collimator: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    bank_a: Vec<f64>,
    bank_b: Vec<f64>,
    /// Cumulative meterset weight normalised to [0, 1].
    weight: f64,
}

/// Presents one planned beam as a stream of interpolated IEC field frames.
pub struct PlanFluenceSource {
    mlc: Arc<dyn MlcModel>,
    states: Vec<CpState>,
    beam_mu: f64,
    cp_delta: f64,
}

impl PlanFluenceSource {
    /// Build a source for `beam`, delivering `beam_mu` monitor units over
    /// its full meterset, interpolating control points at step `cp_delta`.
    pub fn new(beam: &PlanBeam, beam_mu: f64, cp_delta: f64) -> Result<Self, PlanAdapterError> {
        if !(cp_delta > 0.0 && cp_delta <= 1.0) {
            return Err(PlanAdapterError::InvalidCpDelta(cp_delta));
        }
        if beam.control_points.is_empty() {
            return Err(PlanAdapterError::NoControlPoints(beam.beam_number));
        }
        let boundaries = beam
            .limiting_device(LimitingDeviceType::MlcX)
            .and_then(|d| d.leaf_position_boundaries.as_deref())
            .ok_or(PlanAdapterError::MissingMlcBoundaries(beam.beam_number))?;
        let mlc = BoundaryMlc::from_boundaries("DICOM MLCX", boundaries)?;
        let pairs = mlc.leaf_pair_count();

        let final_weight = if beam.final_cumulative_meterset_weight > 0.0 {
            beam.final_cumulative_meterset_weight
        } else {
            1.0
        };

        // Resolve the sparse control points into complete states, carrying
        // every value forward until the plan changes it. Y jaws default to
        // the MLC band extent when the plan never positions them.
        let y_lo = mlc.leaf_info(0).y_centre_mm - 0.5 * mlc.leaf_info(0).width_mm;
        let last = mlc.leaf_info(pairs - 1);
        let y_hi = last.y_centre_mm + 0.5 * last.width_mm;
        let mut state = CpState {
            x1: -20.0,
            x2: 20.0,
            y1: y_lo / 10.0,
            y2: y_hi / 10.0,
            bank_a: vec![0.0; pairs],
            bank_b: vec![0.0; pairs],
            ..Default::default()
        };
        let mut states = Vec::with_capacity(beam.control_points.len());
        for cp in &beam.control_points {
            if let Some(v) = cp.gantry_angle {
                state.gantry = v;
            }
            if let Some(v) = cp.collimator_angle {
                state.collimator = v;
            }
            if let Some(v) = cp.cumulative_meterset_weight {
                state.weight = v / final_weight;
            }
            for dp in &cp.device_positions {
                match dp.device_type {
                    LimitingDeviceType::X | LimitingDeviceType::AsymX => {
                        if dp.positions.len() >= 2 {
                            state.x1 = dp.positions[0] / 10.0;
                            state.x2 = dp.positions[1] / 10.0;
                        }
                    }
                    LimitingDeviceType::Y | LimitingDeviceType::AsymY => {
                        if dp.positions.len() >= 2 {
                            state.y1 = dp.positions[0] / 10.0;
                            state.y2 = dp.positions[1] / 10.0;
                        }
                    }
                    LimitingDeviceType::MlcX | LimitingDeviceType::MlcY => {
                        if dp.positions.len() != 2 * pairs {
                            return Err(PlanAdapterError::MlcPositionCount {
                                got: dp.positions.len(),
                                expected: 2 * pairs,
                            });
                        }
                        for i in 0..pairs {
                            state.bank_a[i] = dp.positions[i] / 10.0;
                            state.bank_b[i] = dp.positions[pairs + i] / 10.0;
                        }
                    }
                }
            }
            states.push(state.clone());
        }
        debug!(
            control_points = states.len(),
            beam_mu, cp_delta, "resolved plan beam"
        );

        Ok(Self {
            mlc: Arc::new(mlc),
            states,
            beam_mu,
            cp_delta,
        })
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn interpolate(a: &CpState, b: &CpState, t: f64) -> CpState {
    CpState {
        gantry: lerp(a.gantry, b.gantry, t),
        collimator: lerp(a.collimator, b.collimator, t),
        x1: lerp(a.x1, b.x1, t),
        x2: lerp(a.x2, b.x2, t),
        y1: lerp(a.y1, b.y1, t),
        y2: lerp(a.y2, b.y2, t),
        bank_a: a
            .bank_a
            .iter()
            .zip(&b.bank_a)
            .map(|(p, q)| lerp(*p, *q, t))
            .collect(),
        bank_b: a
            .bank_b
            .iter()
            .zip(&b.bank_b)
            .map(|(p, q)| lerp(*p, *q, t))
            .collect(),
        weight: lerp(a.weight, b.weight, t),
    }
}

impl PlanFluenceSource {
    fn sample_from(&self, state: &CpState, delta_mu: f64) -> FieldSample {
        FieldSample {
            gantry: state.gantry,
            collimator: state.collimator,
            x1: state.x1.min(state.x2),
            x2: state.x1.max(state.x2),
            y1: state.y1.min(state.y2),
            y2: state.y1.max(state.y2),
            bank_a: state.bank_a.clone(),
            bank_b: state.bank_b.clone(),
            delta_mu,
            beam_hold: false,
        }
    }
}

impl FluenceSource for PlanFluenceSource {
    type Frame = FieldSample;

    fn mlc_model(&self) -> Arc<dyn MlcModel> {
        self.mlc.clone()
    }

    fn frames(&self) -> FluenceResult<Vec<FieldSample>> {
        let mut frames = Vec::new();
        let first = &self.states[0];
        frames.push(self.sample_from(first, 0.0));
        let mut prev_weight = first.weight;

        // ceil(1 / cp_delta) interpolation steps per segment; the guard
        // keeps an exactly divisible step count from gaining a step to
        // floating-point noise.
        let steps = ((1.0 / self.cp_delta) - 1e-9).ceil().max(1.0) as usize;
        for pair in self.states.windows(2) {
            for j in 1..=steps {
                let t = (j as f64 * self.cp_delta).min(1.0);
                let state = interpolate(&pair[0], &pair[1], t);
                let delta_mu = (state.weight - prev_weight) * self.beam_mu;
                prev_weight = state.weight;
                frames.push(self.sample_from(&state, delta_mu));
            }
        }
        Ok(frames)
    }
}
