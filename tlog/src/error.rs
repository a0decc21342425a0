use crate::axis::LogAxis;

#[derive(thiserror::Error, Debug)]
pub enum TrajectoryLogError {
    #[error("Failed to read trajectory log file.")]
    IO(#[from] std::io::Error),
    #[error("Unexpected end of data at byte offset {0}.")]
    UnexpectedEof(usize),
    #[error("Not a trajectory log: bad signature {0:?}")]
    BadSignature(String),
    #[error("Unknown axis enumeration value: {0}")]
    UnknownAxis(i32),
    #[error("Unknown axis scale: {0}")]
    UnknownAxisScale(i32),
    #[error("Unknown MLC model code: {0}")]
    UnknownMlcModel(i32),
    #[error("Implausible header field {field}: {value}")]
    ImplausibleHeader { field: &'static str, value: i64 },
    #[error("MLC axis carries {samples} samples, model {model} expects {expected}")]
    MlcSampleCount {
        samples: usize,
        model: String,
        expected: usize,
    },
    #[error("Snapshot data ends early: expected {expected} snapshots, data holds {actual}")]
    TruncatedSnapshots { expected: usize, actual: usize },
    #[error("Axis {0} is not sampled in this log")]
    MissingAxis(LogAxis),
    #[error("Snapshot index {index} out of range ({count} snapshots)")]
    SnapshotOutOfRange { index: usize, count: usize },
    #[error("Leaf index {leaf} out of range ({pairs} pairs)")]
    LeafOutOfRange { leaf: usize, pairs: usize },
    #[error("Sub-beam index {index} out of range ({count} sub-beams)")]
    SubBeamOutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, TrajectoryLogError>;
