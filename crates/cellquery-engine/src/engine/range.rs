//! The three wrapped value shapes and their shared range contract.
//!
//! - [`ScalarValue`] - a single raw value
//! - [`GridValue`] - a rectangular buffer with an optional column map
//! - [`TableValue`] - a grid with a mandatory header list
//!
//! Only values built directly at wrap time carry an [`Origin`]; anything
//! produced by [`RangeValue::rebuild`] has none.

use std::sync::Arc;

use rhai::Dynamic;

use super::columns::{ColumnMap, wrap_index};
use super::escalation::{Anchor, CellResolver, Origin};
use super::row::RowView;
use super::snapshot::CellSnapshot;
use super::value::{CellValue, RawGrid};
use crate::error::QueryError;

/// Behaviour shared by every range shape.
pub trait RangeValue {
    /// Views over each row, with escalation bound when the range has an origin.
    fn row_views(&self) -> Vec<RowView>;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of the widest row.
    fn width(&self) -> usize;

    fn origin(&self) -> Option<&Origin>;

    /// True for the single-value shape.
    fn is_scalar(&self) -> bool {
        false
    }

    /// Build a derived value of the same shape from new rows. The result
    /// never carries an origin.
    fn rebuild(&self, rows: RawGrid) -> Range;

    /// The underlying buffer.
    fn to_grid(&self) -> RawGrid;

    /// Row by position; negative indices count from the end.
    fn row(&self, index: i64) -> Result<RowView, QueryError> {
        let len = self.len();
        let pos = wrap_index(index, len).ok_or(QueryError::RowOutOfRange { index, len })?;
        Ok(self.row_views().swap_remove(pos))
    }

    /// Snapshots of every cell, row by row.
    fn cells(&self) -> Result<Vec<CellSnapshot>, QueryError> {
        if self.origin().is_none() {
            return Err(QueryError::CellAccessUnavailable(
                "range has no origin".to_string(),
            ));
        }
        let mut out = Vec::new();
        for row in self.row_views() {
            out.extend(row.cells()?);
        }
        Ok(out)
    }
}

/// One raw value.
#[derive(Clone, Debug)]
pub struct ScalarValue {
    value: CellValue,
    anchor: Option<Anchor>,
}

impl ScalarValue {
    pub fn new(value: CellValue) -> ScalarValue {
        ScalarValue {
            value,
            anchor: None,
        }
    }

    pub fn with_origin(mut self, origin: Origin, resolver: Option<CellResolver>) -> ScalarValue {
        self.anchor = Some(Anchor { origin, resolver });
        self
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }
}

impl RangeValue for ScalarValue {
    fn row_views(&self) -> Vec<RowView> {
        vec![RowView::new(
            vec![self.value.clone()],
            None,
            self.anchor.as_ref().map(|a| a.row(0)),
        )]
    }

    fn len(&self) -> usize {
        1
    }

    fn width(&self) -> usize {
        1
    }

    fn origin(&self) -> Option<&Origin> {
        self.anchor.as_ref().map(|a| &a.origin)
    }

    fn is_scalar(&self) -> bool {
        true
    }

    fn rebuild(&self, mut rows: RawGrid) -> Range {
        if rows.len() == 1 && rows[0].len() == 1 {
            let value = rows.pop().and_then(|mut row| row.pop()).unwrap_or_default();
            Range::Scalar(ScalarValue::new(value))
        } else {
            Range::Grid(GridValue::new(rows))
        }
    }

    fn to_grid(&self) -> RawGrid {
        vec![vec![self.value.clone()]]
    }
}

/// A rectangular buffer of raw values.
#[derive(Clone, Debug)]
pub struct GridValue {
    rows: Arc<RawGrid>,
    columns: Option<Arc<ColumnMap>>,
    anchor: Option<Anchor>,
}

impl GridValue {
    pub fn new(rows: RawGrid) -> GridValue {
        GridValue {
            rows: Arc::new(rows),
            columns: None,
            anchor: None,
        }
    }

    pub fn empty() -> GridValue {
        GridValue::new(Vec::new())
    }

    /// Attach a column map for named access.
    pub fn with_columns<I, S>(mut self, names: I) -> GridValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(Arc::new(ColumnMap::new(names)));
        self
    }

    pub fn with_origin(mut self, origin: Origin, resolver: Option<CellResolver>) -> GridValue {
        self.anchor = Some(Anchor { origin, resolver });
        self
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn columns(&self) -> Option<&ColumnMap> {
        self.columns.as_deref()
    }

    fn view(&self, pos: usize) -> RowView {
        RowView::new(
            self.rows[pos].clone(),
            self.columns.clone(),
            self.anchor.as_ref().map(|a| a.row(pos)),
        )
    }

    fn derived(&self, rows: RawGrid) -> GridValue {
        GridValue {
            rows: Arc::new(rows),
            columns: self.columns.clone(),
            anchor: None,
        }
    }
}

impl RangeValue for GridValue {
    fn row_views(&self) -> Vec<RowView> {
        (0..self.rows.len()).map(|pos| self.view(pos)).collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn origin(&self) -> Option<&Origin> {
        self.anchor.as_ref().map(|a| &a.origin)
    }

    fn rebuild(&self, rows: RawGrid) -> Range {
        Range::Grid(self.derived(rows))
    }

    fn to_grid(&self) -> RawGrid {
        self.rows.as_ref().clone()
    }

    fn row(&self, index: i64) -> Result<RowView, QueryError> {
        let len = self.rows.len();
        let pos = wrap_index(index, len).ok_or(QueryError::RowOutOfRange { index, len })?;
        Ok(self.view(pos))
    }
}

/// A grid whose columns are named by a header row.
#[derive(Clone, Debug)]
pub struct TableValue {
    headers: Arc<Vec<String>>,
    grid: GridValue,
}

impl TableValue {
    pub fn new(headers: Vec<String>, rows: RawGrid) -> TableValue {
        let grid = GridValue::new(rows).with_columns(headers.iter().cloned());
        TableValue {
            headers: Arc::new(headers),
            grid,
        }
    }

    pub fn with_origin(mut self, origin: Origin, resolver: Option<CellResolver>) -> TableValue {
        self.grid = self.grid.with_origin(origin, resolver);
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn grid(&self) -> &GridValue {
        &self.grid
    }
}

impl RangeValue for TableValue {
    fn row_views(&self) -> Vec<RowView> {
        self.grid.row_views()
    }

    fn len(&self) -> usize {
        self.grid.len()
    }

    fn width(&self) -> usize {
        self.headers.len().max(self.grid.width())
    }

    fn origin(&self) -> Option<&Origin> {
        self.grid.origin()
    }

    fn rebuild(&self, rows: RawGrid) -> Range {
        Range::Table(TableValue {
            headers: self.headers.clone(),
            grid: self.grid.derived(rows),
        })
    }

    fn to_grid(&self) -> RawGrid {
        self.grid.to_grid()
    }

    fn row(&self, index: i64) -> Result<RowView, QueryError> {
        self.grid.row(index)
    }
}

/// Any of the three shapes.
#[derive(Clone, Debug)]
pub enum Range {
    Scalar(ScalarValue),
    Grid(GridValue),
    Table(TableValue),
}

impl Range {
    /// A one-column grid holding `values` top to bottom.
    /// Build from host parts: headers make a table, a single value makes a
    /// scalar, anything else a grid.
    pub fn from_parts(
        rows: RawGrid,
        headers: Option<Vec<String>>,
        origin: Option<Origin>,
        resolver: Option<CellResolver>,
    ) -> Range {
        match headers {
            Some(headers) => {
                let table = TableValue::new(headers, rows);
                Range::Table(match origin {
                    Some(origin) => table.with_origin(origin, resolver),
                    None => table,
                })
            }
            None if rows.len() == 1 && rows[0].len() == 1 => {
                let value = rows[0][0].clone();
                let scalar = ScalarValue::new(value);
                Range::Scalar(match origin {
                    Some(origin) => scalar.with_origin(origin, resolver),
                    None => scalar,
                })
            }
            None => {
                let grid = GridValue::new(rows);
                Range::Grid(match origin {
                    Some(origin) => grid.with_origin(origin, resolver),
                    None => grid,
                })
            }
        }
    }

    pub fn into_dynamic(self) -> Dynamic {
        match self {
            Range::Scalar(v) => Dynamic::from(v),
            Range::Grid(v) => Dynamic::from(v),
            Range::Table(v) => Dynamic::from(v),
        }
    }

    pub fn from_dynamic(value: &Dynamic) -> Option<Range> {
        if let Some(v) = value.clone().try_cast::<ScalarValue>() {
            return Some(Range::Scalar(v));
        }
        if let Some(v) = value.clone().try_cast::<GridValue>() {
            return Some(Range::Grid(v));
        }
        value.clone().try_cast::<TableValue>().map(Range::Table)
    }

    fn inner(&self) -> &dyn RangeValue {
        match self {
            Range::Scalar(v) => v,
            Range::Grid(v) => v,
            Range::Table(v) => v,
        }
    }
}

impl RangeValue for Range {
    fn row_views(&self) -> Vec<RowView> {
        self.inner().row_views()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn width(&self) -> usize {
        self.inner().width()
    }

    fn origin(&self) -> Option<&Origin> {
        self.inner().origin()
    }

    fn is_scalar(&self) -> bool {
        matches!(self, Range::Scalar(_))
    }

    fn rebuild(&self, rows: RawGrid) -> Range {
        self.inner().rebuild(rows)
    }

    fn to_grid(&self) -> RawGrid {
        self.inner().to_grid()
    }

    fn row(&self, index: i64) -> Result<RowView, QueryError> {
        self.inner().row(index)
    }
}

macro_rules! rows_into_iter {
    ($($ty:ty),*) => {$(
        impl IntoIterator for $ty {
            type Item = RowView;
            type IntoIter = std::vec::IntoIter<RowView>;

            fn into_iter(self) -> Self::IntoIter {
                self.row_views().into_iter()
            }
        }
    )*};
}

rows_into_iter!(ScalarValue, GridValue, TableValue);

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableValue {
        TableValue::new(
            vec!["Name".to_string(), "Age".to_string()],
            vec![
                vec![CellValue::text("Alice"), CellValue::Number(30.0)],
                vec![CellValue::text("Bob"), CellValue::Number(25.0)],
            ],
        )
    }

    #[test]
    fn table_rows_support_named_access() {
        let table = people();
        let row = table.row(0).unwrap();
        assert_eq!(row.named("age").unwrap().value(), &CellValue::Number(30.0));
        assert_eq!(table.row(-1).unwrap().values()[0], CellValue::text("Bob"));
    }

    #[test]
    fn from_parts_picks_the_shape() {
        let scalar = Range::from_parts(vec![vec![CellValue::Number(1.0)]], None, None, None);
        assert!(matches!(scalar, Range::Scalar(_)));

        let grid = Range::from_parts(
            vec![vec![CellValue::Number(1.0), CellValue::Number(2.0)]],
            None,
            None,
            None,
        );
        assert!(matches!(grid, Range::Grid(_)));

        let table = Range::from_parts(
            vec![vec![CellValue::Number(1.0)]],
            Some(vec!["n".to_string()]),
            None,
            None,
        );
        assert!(matches!(table, Range::Table(_)));
    }

    #[test]
    fn rebuild_keeps_shape_and_drops_origin() {
        let table = people().with_origin(Origin::new("S1", 2, 1), None);
        assert!(table.origin().is_some());

        let derived = table.rebuild(vec![vec![CellValue::text("Bob"), CellValue::Number(25.0)]]);
        match &derived {
            Range::Table(t) => assert_eq!(t.headers(), ["Name", "Age"]),
            other => panic!("expected a table, got {:?}", other),
        }
        assert!(derived.origin().is_none());
        assert!(matches!(
            derived.cells(),
            Err(QueryError::CellAccessUnavailable(_))
        ));
    }

    #[test]
    fn scalar_rebuild_stays_scalar_for_one_value() {
        let scalar = ScalarValue::new(CellValue::Number(3.0));
        assert!(matches!(
            scalar.rebuild(vec![vec![CellValue::Number(4.0)]]),
            Range::Scalar(_)
        ));
        assert!(matches!(scalar.rebuild(Vec::new()), Range::Grid(_)));
    }
}
