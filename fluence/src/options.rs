//! Fluence reconstruction configuration.

use crate::geom::Rect;
use std::fmt;
use std::str::FromStr;

/// Which record stream of a trajectory log to integrate. DICOM plans only
/// carry planned values, where the distinction is irrelevant.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RecordType {
    Expected,
    #[default]
    Actual,
}

impl FromStr for RecordType {
    type Err = RecordTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expected" => Ok(RecordType::Expected),
            "actual" => Ok(RecordType::Actual),
            t => Err(RecordTypeError::ParseError(t.into())),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::Expected => "expected",
            RecordType::Actual => "actual",
        };
        write!(f, "{}", s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RecordTypeError {
    #[error("Failed to parse record type from: {0}")]
    ParseError(String),
}

/// Configuration of one fluence reconstruction. Immutable once handed to the
/// integrator.
#[derive(Clone, Debug, PartialEq)]
pub struct FluenceOptions {
    /// Grid columns.
    pub cols: usize,
    /// Grid rows.
    pub rows: usize,
    /// Physical grid width in cm.
    pub width: f64,
    /// Physical grid height in cm.
    pub height: f64,
    /// Explicit grid bounds; when `None` the grid is centred on the BEV
    /// origin.
    pub bounds: Option<Rect>,
    /// Centre-point rasterisation instead of exact polygon clipping. Meant
    /// for coarse visualisation only.
    pub use_approximate_fluence: bool,
    /// Samples with a MU delta at or below this are skipped (the first
    /// sample is always kept).
    pub min_delta_mu: f64,
    /// Worker count for the row-band partition. 1 gives bit-identical
    /// reproducible accumulation.
    pub max_parallelism: usize,
    /// Record stream selection for trajectory logs.
    pub record_type: RecordType,
    /// Integrate samples taken while the beam was held.
    pub include_beam_holds: bool,
    /// Capture the rotated jaw rectangle of every integrated sample in the
    /// result, for inspection.
    pub record_jaw_outlines: bool,
}

impl FluenceOptions {
    pub fn new(cols: usize, rows: usize, width: f64, height: f64) -> Self {
        Self {
            cols,
            rows,
            width,
            height,
            bounds: None,
            use_approximate_fluence: false,
            min_delta_mu: 0.0,
            max_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            record_type: RecordType::default(),
            include_beam_holds: false,
            record_jaw_outlines: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let o = FluenceOptions::new(100, 100, 20.0, 20.0);
        assert!(!o.use_approximate_fluence);
        assert_eq!(o.min_delta_mu, 0.0);
        assert!(o.max_parallelism >= 1);
        assert_eq!(o.record_type, RecordType::Actual);
    }

    #[test]
    fn record_type_from_str() {
        assert_eq!(RecordType::from_str("actual").unwrap(), RecordType::Actual);
        assert_eq!(
            RecordType::from_str("Expected").unwrap(),
            RecordType::Expected
        );
        assert!(RecordType::from_str("planned").is_err());
    }
}
