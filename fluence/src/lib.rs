//! Reconstruction of the 2D photon fluence delivered by a linear
//! accelerator, from a time-ordered stream of machine states in the beam's
//! eye view.

pub use error::{FluenceError, Result};

mod error;

pub mod aperture;
pub mod geom;
pub mod grid;
pub mod io;
pub mod mlc;
pub mod options;
pub mod sample;
pub mod scale;

mod fluence;
mod integrator;

pub use fluence::{CancelToken, Fluence};
pub use integrator::{create_fluence, create_fluence_with_cancel};
pub use options::{FluenceOptions, RecordType};
