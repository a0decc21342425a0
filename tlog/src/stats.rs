//! Per-axis delivery statistics.

use crate::axis::LogAxis;
use crate::error::Result;
use crate::reader::TrajectoryLog;
use linac_tools_fluence::RecordType;

/// RMS and maximum absolute deviation between the expected and actual
/// record of one axis, over all snapshots.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxisStats {
    pub axis: LogAxis,
    pub rms_error: f64,
    pub max_error: f64,
}

/// Statistics for every scalar axis sampled in `log`. The MLC axis is
/// covered by [`mlc_statistics`].
pub fn axis_statistics(log: &TrajectoryLog) -> Result<Vec<AxisStats>> {
    let n = log.num_snapshots();
    let mut stats = Vec::new();
    for axis in log.header().axes.clone() {
        if axis == LogAxis::Mlc {
            continue;
        }
        let mut sum_sq = 0.0;
        let mut max = 0.0f64;
        for s in 0..n {
            let expected = log.value(axis, s, RecordType::Expected)?;
            let actual = log.value(axis, s, RecordType::Actual)?;
            let err = (actual - expected).abs();
            sum_sq += err * err;
            max = max.max(err);
        }
        let rms = if n == 0 { 0.0 } else { (sum_sq / n as f64).sqrt() };
        stats.push(AxisStats {
            axis,
            rms_error: rms,
            max_error: max,
        });
    }
    Ok(stats)
}

/// RMS and maximum deviation over every leaf of both banks.
pub fn mlc_statistics(log: &TrajectoryLog) -> Result<Option<AxisStats>> {
    use linac_tools_fluence::scale::Bank;

    if log.header().axis_index(LogAxis::Mlc).is_none() {
        return Ok(None);
    }
    let pairs = log.header().mlc_model.leaf_pair_count();
    let n = log.num_snapshots();
    let mut sum_sq = 0.0;
    let mut max = 0.0f64;
    let mut count = 0usize;
    for s in 0..n {
        for bank in [Bank::A, Bank::B] {
            for leaf in 0..pairs {
                let expected = log.leaf(bank, leaf, s, RecordType::Expected)?;
                let actual = log.leaf(bank, leaf, s, RecordType::Actual)?;
                let err = (actual - expected).abs();
                sum_sq += err * err;
                max = max.max(err);
                count += 1;
            }
        }
    }
    let rms = if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    };
    Ok(Some(AxisStats {
        axis: LogAxis::Mlc,
        rms_error: rms,
        max_error: max,
    }))
}
