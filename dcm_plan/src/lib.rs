//! Trimmed DICOM RT Plan model, reader and fluence adaptation.

mod adapter;
mod io;
mod model;
mod rtimage;

pub use adapter::{PlanAdapterError, PlanFluenceSource};
pub use io::{DcmPlanError, obj_to_rtplan, read_rtplan};
pub use model::*;
pub use rtimage::{RtImageError, write_rt_image};
