//! Read-only per-cell metadata returned by cell escalation.

use super::value::CellValue;

/// Fill settings of a cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interior {
    pub color_index: i64,
    /// RGB packed as `0xRRGGBB`.
    pub color: i64,
    pub pattern: i64,
}

/// Font settings of a cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
    pub size: f64,
    pub name: String,
    pub color: i64,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            bold: false,
            italic: false,
            size: 11.0,
            name: "Calibri".to_string(),
            color: 0,
        }
    }
}

/// Immutable snapshot of one host cell.
///
/// `row`/`col` are 1-based absolute positions; `address` is the host's
/// display form (e.g. `S1!$B$2`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellSnapshot {
    pub value: CellValue,
    pub formula: String,
    pub number_format: String,
    pub address: String,
    pub row: usize,
    pub col: usize,
    pub interior: Interior,
    pub font: Font,
}

impl CellSnapshot {
    pub fn color(&self) -> i64 {
        self.interior.color
    }

    pub fn color_index(&self) -> i64 {
        self.interior.color_index
    }

    pub fn pattern(&self) -> i64 {
        self.interior.pattern
    }

    pub fn bold(&self) -> bool {
        self.font.bold
    }

    pub fn italic(&self) -> bool {
        self.font.italic
    }

    pub fn font_size(&self) -> f64 {
        self.font.size
    }

    pub fn font_name(&self) -> &str {
        &self.font.name
    }

    pub fn font_color(&self) -> i64 {
        self.font.color
    }

    pub fn has_formula(&self) -> bool {
        !self.formula.is_empty()
    }
}
