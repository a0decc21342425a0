use crate::scale::Scale;

#[derive(thiserror::Error, Debug)]
pub enum FluenceError {
    #[error("Invalid sample at index {index}: {reason}")]
    InvalidSample { index: usize, reason: String },
    #[error("Unsupported scale conversion from {from} to {to}")]
    UnsupportedScaleConversion { from: Scale, to: Scale },
    #[error("Sample {index} carries {sample} leaf pairs, MLC model \"{model}\" expects {expected}")]
    MlcModelMismatch {
        index: usize,
        sample: usize,
        model: String,
        expected: usize,
    },
    #[error("Invalid MLC model: {0}")]
    InvalidMlcModel(String),
}

pub type Result<T> = std::result::Result<T, FluenceError>;
