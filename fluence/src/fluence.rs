//! The finished fluence result.

use crate::geom::Polygon;
use crate::grid::Grid;
use crate::options::FluenceOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation token. Workers check it between samples; once
/// cancelled, the sweep stops promptly and the partially filled grid is
/// returned marked incomplete.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The accumulated fluence of one sweep.
///
/// Cell values are MU-weighted covered fractions: a cell fully covered by
/// the aperture during a sample gains that sample's full MU delta, so
/// `sum() * dx * dy` equals the MU-weighted open aperture area inside the
/// grid.
#[derive(Clone, Debug)]
pub struct Fluence {
    grid: Grid,
    options: FluenceOptions,
    jaw_outlines: Vec<Polygon>,
    complete: bool,
}

impl Fluence {
    pub(crate) fn new(
        grid: Grid,
        options: FluenceOptions,
        jaw_outlines: Vec<Polygon>,
        complete: bool,
    ) -> Self {
        Self {
            grid,
            options,
            jaw_outlines,
            complete,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn options(&self) -> &FluenceOptions {
        &self.options
    }

    /// Jaw outlines captured per integrated sample, when
    /// [`FluenceOptions::record_jaw_outlines`] was set.
    pub fn jaw_outlines(&self) -> &[Polygon] {
        &self.jaw_outlines
    }

    /// False when the sweep was cancelled before visiting every sample.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
