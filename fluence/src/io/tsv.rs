//! Plain tab-separated fluence export.

use crate::fluence::Fluence;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Write the grid as rows of tab-separated values, one line per grid row.
pub fn write_tsv<W: Write>(w: &mut W, fluence: &Fluence) -> std::io::Result<()> {
    let grid = fluence.grid();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if col > 0 {
                write!(w, "\t")?;
            }
            write!(w, "{}", grid.get(row, col))?;
        }
        write!(w, "{}", LINE_ENDING)?;
    }
    Ok(())
}

pub fn write_tsv_file<P: AsRef<Path>>(path: P, fluence: &Fluence) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_tsv(&mut w, fluence)
}
