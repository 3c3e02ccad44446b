//! In-memory host: named sheets, opaque range handles and the bridges an
//! evaluation unit uses to reach them.

use std::collections::HashMap;
use std::sync::Arc;

use cellquery_engine::engine::{
    CellRef, CellSnapshot, CellValue, Dynamic, Font, HostBridges, Interior, RawGrid,
};
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::storage::{CellStyle, StylesFile};

/// Formatting stored beside a cell's value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellFormat {
    pub formula: String,
    pub number_format: String,
    pub interior: Interior,
    pub font: Font,
}

#[derive(Clone, Debug, Default)]
pub struct Sheet {
    values: RawGrid,
    formats: HashMap<CellRef, CellFormat>,
}

impl Sheet {
    pub fn new(values: RawGrid) -> Sheet {
        Sheet {
            values,
            formats: HashMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.values.len()
    }

    pub fn cols(&self) -> usize {
        self.values.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Value at a 1-based position; outside the used area is empty.
    pub fn value(&self, cell: CellRef) -> CellValue {
        cell.row
            .checked_sub(1)
            .zip(cell.col.checked_sub(1))
            .and_then(|(r, c)| self.values.get(r)?.get(c))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, cell: CellRef, value: CellValue) {
        let (r, c) = (cell.row.saturating_sub(1), cell.col.saturating_sub(1));
        if self.values.len() <= r {
            self.values.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.values[r];
        if row.len() <= c {
            row.resize(c + 1, CellValue::Empty);
        }
        row[c] = value;
    }

    pub fn format(&self, cell: CellRef) -> Option<&CellFormat> {
        self.formats.get(&cell)
    }

    pub fn format_mut(&mut self, cell: CellRef) -> &mut CellFormat {
        self.formats.entry(cell).or_default()
    }
}

/// Opaque handle a host passes for a sheet region.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeHandle {
    pub sheet: String,
    pub top: usize,
    pub left: usize,
    pub rows: usize,
    pub cols: usize,
    /// The first row holds column names.
    pub headers: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Workbook {
    sheets: Arc<DashMap<String, Sheet>>,
}

impl Workbook {
    pub fn new() -> Workbook {
        Workbook::default()
    }

    pub fn add_sheet(&self, name: impl Into<String>, values: RawGrid) {
        self.sheets.insert(name.into(), Sheet::new(values));
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sheets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn set_value(&self, sheet: &str, cell: CellRef, value: CellValue) -> Result<()> {
        let mut entry = self.sheets.get_mut(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        entry.set_value(cell, value);
        Ok(())
    }

    pub fn set_format(&self, sheet: &str, cell: CellRef, format: CellFormat) -> Result<()> {
        let mut entry = self.sheets.get_mut(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        *entry.format_mut(cell) = format;
        Ok(())
    }

    /// Handle covering everything in `sheet` from `A1` to its last used cell.
    pub fn used_range(&self, sheet: &str, headers: bool) -> Option<RangeHandle> {
        let entry = self.sheets.get(sheet)?;
        Some(RangeHandle {
            sheet: sheet.to_string(),
            top: 1,
            left: 1,
            rows: entry.rows(),
            cols: entry.cols(),
            headers,
        })
    }

    /// Body values of `handle` (the header row excluded).
    pub fn values(&self, handle: &RangeHandle) -> Result<RawGrid> {
        let sheet = self
            .sheets
            .get(&handle.sheet)
            .ok_or_else(|| unknown_sheet(&handle.sheet))?;
        let skip = usize::from(handle.headers);
        let grid = (skip..handle.rows)
            .map(|r| {
                (0..handle.cols)
                    .map(|c| (*sheet).value(CellRef::new(handle.top + r, handle.left + c)))
                    .collect()
            })
            .collect();
        Ok(grid)
    }

    pub fn headers(&self, handle: &RangeHandle) -> Option<Vec<String>> {
        if !handle.headers || handle.rows == 0 {
            return None;
        }
        let sheet = self.sheets.get(&handle.sheet)?;
        Some(
            (0..handle.cols)
                .map(|c| (*sheet).value(CellRef::new(handle.top, handle.left + c)).to_string())
                .collect(),
        )
    }

    /// Position of the first body cell.
    pub fn origin(&self, handle: &RangeHandle) -> Option<(String, usize, usize)> {
        if !self.has_sheet(&handle.sheet) {
            return None;
        }
        let top = handle.top + usize::from(handle.headers);
        Some((handle.sheet.clone(), top, handle.left))
    }

    pub fn snapshot(&self, sheet: &str, row: usize, col: usize) -> Result<CellSnapshot> {
        let entry = self.sheets.get(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        let cell = CellRef::new(row, col);
        let format = entry.format(cell).cloned().unwrap_or_default();
        Ok(CellSnapshot {
            value: (*entry).value(cell),
            formula: format.formula,
            number_format: format.number_format,
            address: cell.qualified(sheet),
            row,
            col,
            interior: format.interior,
            font: format.font,
        })
    }

    /// Apply a styles file, returning how many entries were used.
    /// Entries naming an unknown sheet or a bad address are skipped.
    pub fn apply_styles(&self, styles: &StylesFile) -> usize {
        let mut applied = 0;
        for style in &styles.cells {
            let Some(cell) = CellRef::parse(&style.address) else {
                tracing::warn!(sheet = %style.sheet, address = %style.address, "skipping style: bad address");
                continue;
            };
            let Some(mut sheet) = self.sheets.get_mut(&style.sheet) else {
                tracing::warn!(sheet = %style.sheet, "skipping style: unknown sheet");
                continue;
            };
            merge_style(sheet.format_mut(cell), style);
            applied += 1;
        }
        applied
    }

    /// Bridges that treat [`RangeHandle`] values as handles into this workbook.
    pub fn bridges(&self) -> HostBridges {
        let values = self.clone();
        let headers = self.clone();
        let origin = self.clone();
        let cells = self.clone();
        HostBridges::new(
            |value: &Dynamic| value.is::<RangeHandle>(),
            move |value: &Dynamic| {
                let handle = as_handle(value).ok_or("not a range handle")?;
                values.values(&handle).map_err(|e| e.to_string())
            },
        )
        .with_headers(move |value| headers.headers(&as_handle(value)?))
        .with_origin(move |value| origin.origin(&as_handle(value)?))
        .with_cell_resolver(move |sheet, row, col| {
            cells.snapshot(sheet, row, col).map_err(|e| e.to_string())
        })
    }
}

fn as_handle(value: &Dynamic) -> Option<RangeHandle> {
    value.clone().try_cast::<RangeHandle>()
}

fn unknown_sheet(name: &str) -> Error {
    Error::Evaluation(format!("unknown sheet '{}'", name))
}

fn merge_style(format: &mut CellFormat, style: &CellStyle) {
    if let Some(formula) = &style.formula {
        format.formula = formula.clone();
    }
    if let Some(number_format) = &style.number_format {
        format.number_format = number_format.clone();
    }
    if let Some(bold) = style.bold {
        format.font.bold = bold;
    }
    if let Some(italic) = style.italic {
        format.font.italic = italic;
    }
    if let Some(name) = &style.font {
        format.font.name = name.clone();
    }
    if let Some(size) = style.font_size {
        format.font.size = size;
    }
    if let Some(color) = style.font_color {
        format.font.color = color;
    }
    if let Some(color) = style.color {
        format.interior.color = color;
    }
    if let Some(index) = style.color_index {
        format.interior.color_index = index;
    }
    if let Some(pattern) = style.pattern {
        format.interior.pattern = pattern;
    }
}
