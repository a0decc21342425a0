//! The field data adapter contract.
//!
//! The integrator is polymorphic over [`FluenceSource`] alone: trajectory-log
//! snapshots and interpolated DICOM control points both surface here as
//! frames whose axis values are already IEC 61217, in cm and degrees.

use crate::error::Result;
use crate::mlc::MlcModel;
use crate::scale::Bank;
use std::sync::Arc;

/// One machine state, viewed through the adapter contract. All values are
/// IEC 61217: jaws and leaf positions in cm, angles in degrees.
pub trait FieldFrame {
    fn gantry(&self) -> f64;
    fn collimator(&self) -> f64;
    fn x1(&self) -> f64;
    fn x2(&self) -> f64;
    fn y1(&self) -> f64;
    fn y2(&self) -> f64;
    fn leaf_pair_count(&self) -> usize;
    fn leaf_position(&self, bank: Bank, leaf: usize) -> f64;
    /// Monitor units delivered since the previous frame; never negative for
    /// a valid stream.
    fn delta_mu(&self) -> f64;
    fn is_beam_hold(&self) -> bool;
}

/// A source of field frames. `frames` is restartable: each call materialises
/// the full stream again, so the integrator can run more than once over the
/// same source.
pub trait FluenceSource {
    type Frame: FieldFrame + Send + Sync;

    fn mlc_model(&self) -> Arc<dyn MlcModel>;
    fn frames(&self) -> Result<Vec<Self::Frame>>;
}

/// A concrete, owned frame. Adapters that eagerly convert their native
/// records into IEC end up producing these.
#[derive(Clone, Debug, Default)]
pub struct FieldSample {
    pub gantry: f64,
    pub collimator: f64,
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
    /// Leaf positions per bank, in cm IEC; both banks have equal length.
    pub bank_a: Vec<f64>,
    pub bank_b: Vec<f64>,
    pub delta_mu: f64,
    pub beam_hold: bool,
}

impl FieldFrame for FieldSample {
    fn gantry(&self) -> f64 {
        self.gantry
    }

    fn collimator(&self) -> f64 {
        self.collimator
    }

    fn x1(&self) -> f64 {
        self.x1
    }

    fn x2(&self) -> f64 {
        self.x2
    }

    fn y1(&self) -> f64 {
        self.y1
    }

    fn y2(&self) -> f64 {
        self.y2
    }

    fn leaf_pair_count(&self) -> usize {
        self.bank_a.len().min(self.bank_b.len())
    }

    fn leaf_position(&self, bank: Bank, leaf: usize) -> f64 {
        match bank {
            Bank::A => self.bank_a[leaf],
            Bank::B => self.bank_b[leaf],
        }
    }

    fn delta_mu(&self) -> f64 {
        self.delta_mu
    }

    fn is_beam_hold(&self) -> bool {
        self.beam_hold
    }
}

/// A source over frames that already live in memory. Used by tests and by
/// callers that assemble synthetic fields.
#[derive(Clone, Debug)]
pub struct MemorySource {
    mlc: Arc<dyn MlcModel>,
    samples: Vec<FieldSample>,
}

impl MemorySource {
    pub fn new(mlc: Arc<dyn MlcModel>, samples: Vec<FieldSample>) -> Self {
        Self { mlc, samples }
    }
}

impl FluenceSource for MemorySource {
    type Frame = FieldSample;

    fn mlc_model(&self) -> Arc<dyn MlcModel> {
        self.mlc.clone()
    }

    fn frames(&self) -> Result<Vec<FieldSample>> {
        Ok(self.samples.clone())
    }
}
