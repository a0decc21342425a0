//! Binary trajectory log parsing and snapshot access.

use crate::axis::LogAxis;
use crate::error::{Result, TrajectoryLogError};
use crate::header::{AxisScale, Header, MlcModelCode};
use crate::subbeam::SubBeam;
use linac_tools_fluence::RecordType;
use linac_tools_fluence::scale::Bank;
use log::{debug, trace};
use std::fs;
use std::ops::Range;
use std::path::Path;

const SIGNATURE: &str = "VOSTL";
const SIGNATURE_LEN: usize = 16;
const VERSION_LEN: usize = 16;
const SUBBEAM_NAME_LEN: usize = 512;
/// Carriage positions precede the leaf samples on the MLC axis.
const MLC_CARRIAGES: usize = 2;

/// Little-endian reader over the raw log bytes.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(TrajectoryLogError::UnexpectedEof(self.pos));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn seek_to(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(TrajectoryLogError::UnexpectedEof(self.pos));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// A fixed-width NUL-padded string field.
    fn read_str(&mut self, n: usize) -> Result<String> {
        let b = self.take(n)?;
        let end = b.iter().position(|&c| c == 0).unwrap_or(n);
        Ok(String::from_utf8_lossy(&b[..end]).into_owned())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// A fully parsed trajectory log: header, sub-beams and the snapshot matrix.
///
/// Snapshot values are stored as recorded, in the scale named by the header;
/// every sample is an (expected, actual) pair.
#[derive(Clone, Debug)]
pub struct TrajectoryLog {
    header: Header,
    subbeams: Vec<SubBeam>,
    /// Expected/actual pairs, snapshot-major then axis-sample order.
    values: Vec<f32>,
}

impl TrajectoryLog {
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        debug!("read {} bytes from {:?}", bytes.len(), path.as_ref());
        Self::read(&bytes)
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);

        let signature = r.read_str(SIGNATURE_LEN)?;
        if !signature.starts_with(SIGNATURE) {
            return Err(TrajectoryLogError::BadSignature(signature));
        }
        let version = r.read_str(VERSION_LEN)?;
        let header_size = positive(r.read_i32()?, "header size")?;
        let sampling_interval_ms = r.read_i32()?;
        let num_axes = positive(r.read_i32()?, "axis count")?;
        if num_axes > 64 {
            return Err(TrajectoryLogError::ImplausibleHeader {
                field: "axis count",
                value: num_axes as i64,
            });
        }

        let mut axes = Vec::with_capacity(num_axes);
        for _ in 0..num_axes {
            axes.push(LogAxis::from_code(r.read_i32()?)?);
        }
        let mut samples_per_axis = Vec::with_capacity(num_axes);
        for _ in 0..num_axes {
            samples_per_axis.push(positive(r.read_i32()?, "samples per axis")?);
        }

        let axis_scale = AxisScale::from_code(r.read_i32()?)?;
        let num_subbeams = non_negative(r.read_i32()?, "sub-beam count")?;
        let is_truncated = r.read_i32()? != 0;
        let num_snapshots = non_negative(r.read_i32()?, "snapshot count")?;
        let mlc_model = MlcModelCode::from_code(r.read_i32()?)?;

        let header = Header {
            version,
            header_size,
            sampling_interval_ms,
            axes,
            samples_per_axis,
            axis_scale,
            num_subbeams,
            is_truncated,
            num_snapshots,
            mlc_model,
        };
        if let Some(idx) = header.axis_index(LogAxis::Mlc) {
            let samples = header.samples_per_axis[idx];
            let expected = MLC_CARRIAGES + 2 * mlc_model.leaf_pair_count();
            if samples != expected {
                return Err(TrajectoryLogError::MlcSampleCount {
                    samples,
                    model: mlc_model.to_string(),
                    expected,
                });
            }
        }
        trace!("header: {:#?}", &header);

        // The remainder of the fixed header block is reserved.
        r.seek_to(header.header_size)?;

        let mut subbeams = Vec::with_capacity(header.num_subbeams);
        for _ in 0..header.num_subbeams {
            let control_point = r.read_i32()?;
            let monitor_units = r.read_f32()? as f64;
            let radiation_time = r.read_f32()? as f64;
            let sequence = r.read_i32()?;
            let name = r.read_str(SUBBEAM_NAME_LEN)?;
            subbeams.push(SubBeam {
                control_point,
                monitor_units,
                radiation_time,
                sequence,
                name,
            });
        }

        let per_snapshot = header.samples_per_snapshot() * 2;
        let available = r.remaining() / (per_snapshot * 4);
        let mut header = header;
        if available < header.num_snapshots {
            if header.is_truncated {
                debug!(
                    "truncated log: {} of {} snapshots present",
                    available, header.num_snapshots
                );
                header.num_snapshots = available;
            } else {
                return Err(TrajectoryLogError::TruncatedSnapshots {
                    expected: header.num_snapshots,
                    actual: available,
                });
            }
        }

        let count = header.num_snapshots * per_snapshot;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(r.read_f32()?);
        }

        Ok(Self {
            header,
            subbeams,
            values,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn subbeams(&self) -> &[SubBeam] {
        &self.subbeams
    }

    pub fn num_snapshots(&self) -> usize {
        self.header.num_snapshots
    }

    fn sample(&self, offset: usize, snapshot: usize, record: RecordType) -> f64 {
        let pair = snapshot * self.header.samples_per_snapshot() + offset;
        let idx = pair * 2
            + match record {
                RecordType::Expected => 0,
                RecordType::Actual => 1,
            };
        self.values[idx] as f64
    }

    fn check_snapshot(&self, snapshot: usize) -> Result<()> {
        if snapshot >= self.header.num_snapshots {
            return Err(TrajectoryLogError::SnapshotOutOfRange {
                index: snapshot,
                count: self.header.num_snapshots,
            });
        }
        Ok(())
    }

    /// The value of a scalar axis in one snapshot.
    pub fn value(&self, axis: LogAxis, snapshot: usize, record: RecordType) -> Result<f64> {
        self.check_snapshot(snapshot)?;
        let offset = self
            .header
            .axis_offset(axis)
            .ok_or(TrajectoryLogError::MissingAxis(axis))?;
        Ok(self.sample(offset, snapshot, record))
    }

    /// An MLC leaf position in one snapshot, in the scale of the log.
    pub fn leaf(
        &self,
        bank: Bank,
        leaf: usize,
        snapshot: usize,
        record: RecordType,
    ) -> Result<f64> {
        self.check_snapshot(snapshot)?;
        let offset = self
            .header
            .axis_offset(LogAxis::Mlc)
            .ok_or(TrajectoryLogError::MissingAxis(LogAxis::Mlc))?;
        let pairs = self.header.mlc_model.leaf_pair_count();
        if leaf >= pairs {
            return Err(TrajectoryLogError::LeafOutOfRange { leaf, pairs });
        }
        let offset = offset + MLC_CARRIAGES + bank.index() * pairs + leaf;
        Ok(self.sample(offset, snapshot, record))
    }

    /// A carriage position in one snapshot.
    pub fn carriage(&self, bank: Bank, snapshot: usize, record: RecordType) -> Result<f64> {
        self.check_snapshot(snapshot)?;
        let offset = self
            .header
            .axis_offset(LogAxis::Mlc)
            .ok_or(TrajectoryLogError::MissingAxis(LogAxis::Mlc))?;
        Ok(self.sample(offset + bank.index(), snapshot, record))
    }

    /// The snapshot range delivered by sub-beam `index`, derived from the
    /// control-point axis: a snapshot belongs to the last sub-beam whose
    /// starting control point it has reached.
    pub fn subbeam_snapshots(&self, index: usize) -> Result<Range<usize>> {
        if index >= self.subbeams.len() {
            return Err(TrajectoryLogError::SubBeamOutOfRange {
                index,
                count: self.subbeams.len(),
            });
        }
        let start_cp = self.subbeams[index].control_point as f64;
        let end_cp = self
            .subbeams
            .get(index + 1)
            .map(|s| s.control_point as f64);

        let mut start = self.header.num_snapshots;
        let mut end = self.header.num_snapshots;
        for s in 0..self.header.num_snapshots {
            let cp = self.value(LogAxis::ControlPoint, s, RecordType::Actual)?;
            if start == self.header.num_snapshots && cp >= start_cp {
                start = s;
            }
            if let Some(e) = end_cp
                && cp >= e
            {
                end = s;
                break;
            }
        }
        Ok(start..end.max(start))
    }
}

fn positive(v: i32, field: &'static str) -> Result<usize> {
    if v <= 0 {
        return Err(TrajectoryLogError::ImplausibleHeader {
            field,
            value: v as i64,
        });
    }
    Ok(v as usize)
}

fn non_negative(v: i32, field: &'static str) -> Result<usize> {
    if v < 0 {
        return Err(TrajectoryLogError::ImplausibleHeader {
            field,
            value: v as i64,
        });
    }
    Ok(v as usize)
}
