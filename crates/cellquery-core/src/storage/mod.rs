//! Loading host data from disk.

pub mod csv;
pub mod styles;

pub use csv::{parse_csv, parse_csv_field, read_csv, to_csv};
pub use styles::{CellStyle, StylesFile, load_styles, parse_styles};
