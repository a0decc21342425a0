//! Multi-leaf collimator models.
//!
//! A model describes the leaf-pair geometry of one installed MLC: how many
//! opposing pairs there are and where each pair sits along Y. Leaf positions
//! themselves come from the field data; the model only supplies the
//! cross-beam band each pair sculpts.

use crate::error::{FluenceError, Result};
use std::fmt::Debug;

/// Geometry of a single leaf pair: the Y centre of its band and the band
/// width, both in mm at isocentre.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LeafInfo {
    pub y_centre_mm: f64,
    pub width_mm: f64,
}

/// Capability describing one MLC installation.
pub trait MlcModel: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn leaf_pair_count(&self) -> usize;
    /// Geometry of pair `index`. Panics when `index` is out of range.
    fn leaf_info(&self, index: usize) -> LeafInfo;
}

fn leaves_from_boundaries(boundaries: &[f64]) -> Result<Vec<LeafInfo>> {
    if boundaries.len() < 2 {
        return Err(FluenceError::InvalidMlcModel(format!(
            "need at least 2 leaf boundaries, got {}",
            boundaries.len()
        )));
    }
    let mut leaves = Vec::with_capacity(boundaries.len() - 1);
    for w in boundaries.windows(2) {
        let width = w[1] - w[0];
        if width <= 0.0 {
            return Err(FluenceError::InvalidMlcModel(format!(
                "leaf boundaries must be strictly increasing: {} -> {}",
                w[0], w[1]
            )));
        }
        leaves.push(LeafInfo {
            y_centre_mm: 0.5 * (w[0] + w[1]),
            width_mm: width,
        });
    }
    Ok(leaves)
}

/// The Varian Millennium 120: 60 pairs spanning 400 mm, with 10 outer pairs
/// of 10 mm on each side and 40 central pairs of 5 mm.
#[derive(Clone, Debug)]
pub struct Millennium120 {
    leaves: Vec<LeafInfo>,
}

impl Millennium120 {
    pub fn new() -> Self {
        let mut boundaries = Vec::with_capacity(61);
        let mut y = -200.0;
        boundaries.push(y);
        for width in std::iter::repeat_n(10.0, 10)
            .chain(std::iter::repeat_n(5.0, 40))
            .chain(std::iter::repeat_n(10.0, 10))
        {
            y += width;
            boundaries.push(y);
        }
        // The boundary list is valid by construction.
        let leaves = leaves_from_boundaries(&boundaries).unwrap();
        Self { leaves }
    }
}

impl Default for Millennium120 {
    fn default() -> Self {
        Self::new()
    }
}

impl MlcModel for Millennium120 {
    fn name(&self) -> &str {
        "Millennium 120"
    }

    fn leaf_pair_count(&self) -> usize {
        self.leaves.len()
    }

    fn leaf_info(&self, index: usize) -> LeafInfo {
        self.leaves[index]
    }
}

/// An MLC model derived from an explicit boundary array of length N + 1,
/// e.g. the Leaf Position Boundaries of a DICOM RT Plan.
#[derive(Clone, Debug)]
pub struct BoundaryMlc {
    name: String,
    leaves: Vec<LeafInfo>,
}

impl BoundaryMlc {
    /// Build a model from N + 1 strictly increasing boundaries in mm.
    pub fn from_boundaries(name: impl Into<String>, boundaries: &[f64]) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            leaves: leaves_from_boundaries(boundaries)?,
        })
    }
}

impl MlcModel for BoundaryMlc {
    fn name(&self) -> &str {
        &self.name
    }

    fn leaf_pair_count(&self) -> usize {
        self.leaves.len()
    }

    fn leaf_info(&self, index: usize) -> LeafInfo {
        self.leaves[index]
    }
}
