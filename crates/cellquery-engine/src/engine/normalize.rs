//! Collapse whatever an expression returns into the host's grid shape.
//!
//! - ranges and raw grids return their buffer unchanged
//! - a row becomes one grid row
//! - arrays become one column, arrays of arrays a 2D grid padded with
//!   empties to the widest row
//! - single values become a 1x1 grid
//! - empty sequences become a grid with no rows

use std::ops::{Range as IntRange, RangeInclusive};

use rhai::{Array, Dynamic, INT};

use super::range::{Range, RangeValue};
use super::row::{ColumnValue, RowView};
use super::snapshot::CellSnapshot;
use super::value::{CellValue, RawGrid};
use crate::error::QueryError;

/// Normalized result handed back across the Rhai boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedGrid(pub RawGrid);

/// Raw value of anything that stands for a single cell.
pub fn cell_value_of(value: &Dynamic) -> Result<CellValue, QueryError> {
    if let Some(v) = CellValue::from_primitive(value) {
        return Ok(v);
    }
    if let Some(column) = value.clone().try_cast::<ColumnValue>() {
        return Ok(column.into_value());
    }
    if let Some(snapshot) = value.clone().try_cast::<CellSnapshot>() {
        return Ok(snapshot.value);
    }
    if let Some(row) = value.clone().try_cast::<RowView>() {
        return row.single().cloned();
    }
    if let Some(Range::Scalar(scalar)) = Range::from_dynamic(value) {
        return Ok(scalar.value().clone());
    }
    Err(QueryError::Unsupported(value.type_name().to_string()))
}

/// Values of anything that stands for one row.
pub fn row_values_of(value: &Dynamic) -> Result<Vec<CellValue>, QueryError> {
    if let Some(row) = value.clone().try_cast::<RowView>() {
        return Ok(row.into_values());
    }
    if value.is_array() {
        let items = value.clone().into_array().unwrap_or_default();
        return items.iter().map(cell_value_of).collect();
    }
    Ok(vec![cell_value_of(value)?])
}

/// Values of anything that stands for a sequence, flattened row by row.
pub fn sequence_values_of(value: &Dynamic) -> Result<Vec<CellValue>, QueryError> {
    if let Some(range) = Range::from_dynamic(value) {
        return Ok(range.to_grid().into_iter().flatten().collect());
    }
    if let Some(r) = value.clone().try_cast::<IntRange<INT>>() {
        return Ok(r.map(CellValue::from).collect());
    }
    if let Some(r) = value.clone().try_cast::<RangeInclusive<INT>>() {
        return Ok(r.map(CellValue::from).collect());
    }
    row_values_of(value)
}

fn pad(mut rows: RawGrid) -> RawGrid {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, CellValue::Empty);
    }
    rows
}

fn normalize_array(items: Array) -> Result<RawGrid, QueryError> {
    if !items.is_empty() && items.iter().all(Dynamic::is_array) {
        let rows = items
            .iter()
            .map(row_values_of)
            .collect::<Result<RawGrid, _>>()?;
        return Ok(pad(rows));
    }
    items
        .iter()
        .map(|item| cell_value_of(item).map(|v| vec![v]))
        .collect()
}

/// Normalize an expression result into a grid.
pub fn normalize(value: Dynamic) -> Result<RawGrid, QueryError> {
    if let Some(range) = Range::from_dynamic(&value) {
        return Ok(range.to_grid());
    }
    if let Some(NormalizedGrid(grid)) = value.clone().try_cast::<NormalizedGrid>() {
        return Ok(grid);
    }
    if let Some(grid) = value.clone().try_cast::<RawGrid>() {
        return Ok(grid);
    }
    if let Some(row) = value.clone().try_cast::<RowView>() {
        return Ok(vec![row.into_values()]);
    }
    if value.is_array() {
        let items = value
            .into_array()
            .map_err(|t| QueryError::Unsupported(t.to_string()))?;
        return normalize_array(items);
    }
    if value.is::<IntRange<INT>>() || value.is::<RangeInclusive<INT>>() {
        return Ok(sequence_values_of(&value)?
            .into_iter()
            .map(|v| vec![v])
            .collect());
    }
    Ok(vec![vec![cell_value_of(&value)?]])
}
