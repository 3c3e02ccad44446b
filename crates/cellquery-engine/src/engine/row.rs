//! Row views and column accessors handed to user predicates.

use std::sync::Arc;

use super::columns::{ColumnMap, wrap_index};
use super::escalation::{CellLocator, RowLocator, resolve_cell};
use super::snapshot::CellSnapshot;
use super::value::CellValue;
use crate::error::QueryError;

/// One row of a grid or table.
#[derive(Clone, Debug)]
pub struct RowView {
    values: Vec<CellValue>,
    columns: Option<Arc<ColumnMap>>,
    locator: Option<RowLocator>,
}

impl RowView {
    pub fn new(
        values: Vec<CellValue>,
        columns: Option<Arc<ColumnMap>>,
        locator: Option<RowLocator>,
    ) -> RowView {
        RowView {
            values,
            columns,
            locator,
        }
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> Option<&[String]> {
        self.columns.as_deref().map(ColumnMap::names)
    }

    /// Positional access; negative indices count from the end.
    pub fn at(&self, index: i64) -> Result<ColumnValue, QueryError> {
        let pos = wrap_index(index, self.values.len()).ok_or(QueryError::ColumnOutOfRange {
            index,
            width: self.values.len(),
        })?;
        Ok(self.column(pos))
    }

    /// Named access, case-insensitive.
    pub fn named(&self, name: &str) -> Result<ColumnValue, QueryError> {
        let Some(columns) = self.columns.as_ref() else {
            return Err(QueryError::UnknownColumn {
                key: name.to_string(),
                available: Vec::new(),
            });
        };
        let pos = columns.lookup(name)?;
        if pos >= self.values.len() {
            return Err(QueryError::ColumnOutOfRange {
                index: pos as i64,
                width: self.values.len(),
            });
        }
        Ok(self.column(pos))
    }

    fn column(&self, pos: usize) -> ColumnValue {
        ColumnValue {
            value: self.values[pos].clone(),
            locator: self.locator.as_ref().map(|row| row.column(pos)),
        }
    }

    /// The row's only value, for single-column rows used as scalars.
    pub fn single(&self) -> Result<&CellValue, QueryError> {
        match self.values.as_slice() {
            [value] => Ok(value),
            values => Err(QueryError::NotSingleColumn(values.len())),
        }
    }

    /// Snapshots of every cell in the row.
    pub fn cells(&self) -> Result<Vec<CellSnapshot>, QueryError> {
        (0..self.values.len())
            .map(|pos| resolve_cell(self.locator.as_ref().map(|row| row.column(pos)).as_ref()))
            .collect()
    }
}

impl IntoIterator for RowView {
    type Item = ColumnValue;
    type IntoIter = std::vec::IntoIter<ColumnValue>;

    fn into_iter(self) -> Self::IntoIter {
        (0..self.values.len())
            .map(|pos| self.column(pos))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// One cell's raw value plus an optional handle for escalation.
#[derive(Clone, Debug)]
pub struct ColumnValue {
    value: CellValue,
    locator: Option<CellLocator>,
}

impl ColumnValue {
    pub fn new(value: CellValue, locator: Option<CellLocator>) -> ColumnValue {
        ColumnValue { value, locator }
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    pub fn into_value(self) -> CellValue {
        self.value
    }

    pub fn to_number(&self) -> Result<f64, QueryError> {
        self.value.to_number()
    }

    pub fn to_bool(&self) -> Result<bool, QueryError> {
        self.value.to_bool()
    }

    pub fn to_text(&self) -> String {
        self.value.to_string()
    }

    pub fn can_escalate(&self) -> bool {
        self.locator.is_some()
    }

    /// Resolve the cell's snapshot through the host.
    pub fn cell(&self) -> Result<CellSnapshot, QueryError> {
        resolve_cell(self.locator.as_ref())
    }
}
