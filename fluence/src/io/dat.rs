//! PTW .dat image writer.

use crate::fluence::Fluence;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `fluence` in the PTW image file format.
///
/// Resolutions and coordinates are emitted in mm with three decimals; the
/// coordinate header row and the per-row prefixes carry the cell centre
/// positions.
pub fn write_dat<W: Write>(w: &mut W, fluence: &Fluence) -> std::io::Result<()> {
    let grid = fluence.grid();
    let dx_mm = grid.dx() * 10.0;
    let dy_mm = grid.dy() * 10.0;

    writeln!(w, "PTW-Image File Format")?;
    writeln!(w, "Version\t1.0")?;
    writeln!(w, "PIXELSPERLINE\t{}", grid.cols())?;
    writeln!(w, "LINESPERIMAGE\t{}", grid.rows())?;
    writeln!(w, "XRESOLUTION\t{:.3}", dx_mm)?;
    writeln!(w, "YRESOLUTION\t{:.3}", dy_mm)?;
    writeln!(w, "XCOORDINATE\t{:.3}", grid.x0() * 10.0)?;
    writeln!(w, "YCOORDINATE\t{:.3}", grid.y0() * 10.0)?;
    writeln!(w, "OFFSET\t\t0.00")?;
    writeln!(w, "UNIT\t\tGy")?;
    writeln!(w, "SOFTWARE\tLOGFILEANALYSER")?;
    writeln!(w, "NORMALIZATION\t100.000")?;

    write!(w, "0;")?;
    for col in 0..grid.cols() {
        let x_mm = (grid.x0() + (col as f64 + 0.5) * grid.dx()) * 10.0;
        write!(w, "\t{:.3}", x_mm)?;
    }
    writeln!(w)?;

    for row in 0..grid.rows() {
        let y_mm = (grid.y0() + (row as f64 + 0.5) * grid.dy()) * 10.0;
        write!(w, "{:.3}", y_mm)?;
        for col in 0..grid.cols() {
            write!(w, "\t{:.3}", grid.get(row, col))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn write_dat_file<P: AsRef<Path>>(path: P, fluence: &Fluence) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_dat(&mut w, fluence)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlc::Millennium120;
    use crate::options::FluenceOptions;
    use crate::sample::{FieldSample, MemorySource};
    use std::sync::Arc;

    fn tiny_fluence() -> Fluence {
        let mlc = Arc::new(Millennium120::new());
        let sample = FieldSample {
            x1: -5.0,
            x2: 5.0,
            y1: -5.0,
            y2: 5.0,
            bank_a: vec![-20.0; 60],
            bank_b: vec![20.0; 60],
            delta_mu: 2.0,
            ..Default::default()
        };
        let source = MemorySource::new(mlc, vec![sample]);
        let mut options = FluenceOptions::new(4, 4, 20.0, 20.0);
        options.max_parallelism = 1;
        crate::integrator::create_fluence(&source, &options).unwrap()
    }

    #[test]
    fn header_layout() {
        let fluence = tiny_fluence();
        let mut buf = Vec::new();
        write_dat(&mut buf, &fluence).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "PTW-Image File Format");
        assert_eq!(lines[1], "Version\t1.0");
        assert_eq!(lines[2], "PIXELSPERLINE\t4");
        assert_eq!(lines[3], "LINESPERIMAGE\t4");
        assert_eq!(lines[4], "XRESOLUTION\t50.000");
        assert_eq!(lines[5], "YRESOLUTION\t50.000");
        assert_eq!(lines[6], "XCOORDINATE\t-100.000");
        assert_eq!(lines[7], "YCOORDINATE\t-100.000");
        assert_eq!(lines[8], "OFFSET\t\t0.00");
        assert_eq!(lines[9], "UNIT\t\tGy");
        assert_eq!(lines[10], "SOFTWARE\tLOGFILEANALYSER");
        assert_eq!(lines[11], "NORMALIZATION\t100.000");
        assert_eq!(lines[12], "0;\t-75.000\t-25.000\t25.000\t75.000");
        // 12 header lines + coordinate row + 4 data rows.
        assert_eq!(lines.len(), 17);
        assert!(lines[13].starts_with("-75.000\t"));
    }

    #[test]
    fn data_rows_carry_grid_values() {
        let fluence = tiny_fluence();
        let mut buf = Vec::new();
        write_dat(&mut buf, &fluence).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // The open 10 cm field covers the central 2x2 cells of the 4x4 grid.
        let row: Vec<&str> = text.lines().nth(14).unwrap().split('\t').collect();
        assert_eq!(row[0], "-25.000");
        assert_eq!(row[1], "0.000");
        assert_eq!(row[2], "2.000");
        assert_eq!(row[3], "2.000");
        assert_eq!(row[4], "0.000");
    }

    #[test]
    fn file_round_trip() {
        let fluence = tiny_fluence();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluence.dat");
        write_dat_file(&path, &fluence).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("PTW-Image File Format"));
    }
}
