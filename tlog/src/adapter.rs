//! Field data adapter over a trajectory log.

use crate::axis::LogAxis;
use crate::error::{Result, TrajectoryLogError};
use crate::reader::TrajectoryLog;
use linac_tools_fluence::mlc::MlcModel;
use linac_tools_fluence::sample::{FieldSample, FluenceSource};
use linac_tools_fluence::scale::{Axis, Bank, Scale, ScaleRegistry};
use linac_tools_fluence::{FluenceError, RecordType};
use log::debug;
use std::ops::Range;
use std::sync::Arc;

/// Presents a trajectory log, or a single sub-beam of it, as a stream of
/// IEC 61217 field frames.
///
/// Raw snapshot values are converted out of the log's recorded scale through
/// the supplied registry; the MU axis is differenced into per-frame deltas.
/// Beam hold is active when the hold axis of the selected record is
/// non-zero.
pub struct LogFluenceSource<'a> {
    log: &'a TrajectoryLog,
    registry: &'a ScaleRegistry,
    record: RecordType,
    snapshots: Range<usize>,
    mlc: Arc<dyn MlcModel>,
}

impl<'a> LogFluenceSource<'a> {
    /// A source over the whole log.
    pub fn new(
        log: &'a TrajectoryLog,
        registry: &'a ScaleRegistry,
        record: RecordType,
    ) -> Result<Self> {
        Self::for_snapshots(log, registry, record, 0..log.num_snapshots())
    }

    /// A source over the snapshots of sub-beam `index`.
    pub fn for_subbeam(
        log: &'a TrajectoryLog,
        registry: &'a ScaleRegistry,
        record: RecordType,
        index: usize,
    ) -> Result<Self> {
        let range = log.subbeam_snapshots(index)?;
        debug!("sub-beam {} covers snapshots {:?}", index, &range);
        Self::for_snapshots(log, registry, record, range)
    }

    fn for_snapshots(
        log: &'a TrajectoryLog,
        registry: &'a ScaleRegistry,
        record: RecordType,
        snapshots: Range<usize>,
    ) -> Result<Self> {
        for axis in [
            LogAxis::GantryRtn,
            LogAxis::CollRtn,
            LogAxis::X1,
            LogAxis::X2,
            LogAxis::Y1,
            LogAxis::Y2,
            LogAxis::Mu,
            LogAxis::Mlc,
        ] {
            if log.header().axis_index(axis).is_none() {
                return Err(TrajectoryLogError::MissingAxis(axis));
            }
        }
        Ok(Self {
            log,
            registry,
            record,
            snapshots,
            mlc: log.header().mlc_model.build(),
        })
    }

    fn scale(&self) -> Scale {
        self.log.header().axis_scale.to_scale()
    }

    fn convert(&self, axis: LogAxis, snapshot: usize, index: usize) -> FluenceResult<f64> {
        let raw = self
            .log
            .value(axis, snapshot, self.record)
            .map_err(|e| invalid(index, &e))?;
        let scale_axis = axis.scale_axis().expect("scalar axis");
        self.registry.to_iec(self.scale(), scale_axis, raw)
    }

    fn mu(&self, snapshot: usize, index: usize) -> FluenceResult<f64> {
        self.log
            .value(LogAxis::Mu, snapshot, self.record)
            .map_err(|e| invalid(index, &e))
    }
}

type FluenceResult<T> = std::result::Result<T, FluenceError>;

fn invalid(index: usize, cause: &TrajectoryLogError) -> FluenceError {
    FluenceError::InvalidSample {
        index,
        reason: cause.to_string(),
    }
}

impl FluenceSource for LogFluenceSource<'_> {
    type Frame = FieldSample;

    fn mlc_model(&self) -> Arc<dyn MlcModel> {
        self.mlc.clone()
    }

    fn frames(&self) -> FluenceResult<Vec<FieldSample>> {
        let scale = self.scale();
        let pairs = self.mlc.leaf_pair_count();
        let has_hold = self.log.header().axis_index(LogAxis::BeamHold).is_some();
        let mut frames = Vec::with_capacity(self.snapshots.len());

        let mut prev_mu = if self.snapshots.start > 0 {
            Some(self.mu(self.snapshots.start - 1, self.snapshots.start - 1)?)
        } else {
            None
        };

        for (index, snapshot) in self.snapshots.clone().enumerate() {
            let gantry = self.convert(LogAxis::GantryRtn, snapshot, index)?;
            let collimator = self.convert(LogAxis::CollRtn, snapshot, index)?;
            let jx1 = self.convert(LogAxis::X1, snapshot, index)?;
            let jx2 = self.convert(LogAxis::X2, snapshot, index)?;
            let jy1 = self.convert(LogAxis::Y1, snapshot, index)?;
            let jy2 = self.convert(LogAxis::Y2, snapshot, index)?;
            let (x1, x2) = if jx1 <= jx2 { (jx1, jx2) } else { (jx2, jx1) };
            let (y1, y2) = if jy1 <= jy2 { (jy1, jy2) } else { (jy2, jy1) };

            let mut bank_a = Vec::with_capacity(pairs);
            let mut bank_b = Vec::with_capacity(pairs);
            for leaf in 0..pairs {
                for (bank, out) in [(Bank::A, &mut bank_a), (Bank::B, &mut bank_b)] {
                    let raw = self
                        .log
                        .leaf(bank, leaf, snapshot, self.record)
                        .map_err(|e| invalid(index, &e))?;
                    out.push(self.registry.leaf_to_iec(scale, bank, raw)?);
                }
            }

            let mu = self.mu(snapshot, index)?;
            let delta_mu = match prev_mu {
                Some(prev) => self.registry.delta(scale, Axis::Mu, prev, mu)?,
                None => 0.0,
            };
            prev_mu = Some(mu);

            let beam_hold = if has_hold {
                self.log
                    .value(LogAxis::BeamHold, snapshot, self.record)
                    .map_err(|e| invalid(index, &e))?
                    != 0.0
            } else {
                false
            };

            frames.push(FieldSample {
                gantry,
                collimator,
                x1,
                x2,
                y1,
                y2,
                bank_a,
                bank_b,
                delta_mu,
                beam_hold,
            });
        }
        Ok(frames)
    }
}
