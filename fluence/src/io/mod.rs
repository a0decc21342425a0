mod dat;
mod tsv;

pub use dat::{write_dat, write_dat_file};
pub use tsv::{write_tsv, write_tsv_file};
