//! Planned sub-beams recorded in a trajectory log.

/// One contiguous planned beam within a log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubBeam {
    /// Control point at which the sub-beam starts.
    pub control_point: i32,
    /// Monitor units delivered by this sub-beam.
    pub monitor_units: f64,
    /// Radiation time in seconds.
    pub radiation_time: f64,
    /// Sequence number within the plan.
    pub sequence: i32,
    pub name: String,
}
