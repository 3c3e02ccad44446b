//! Range query engine.
//!
//! Every operation is written once against [`RangeValue`], so scalars,
//! grids and tables share the same semantics (scalars behave as a range of
//! exactly one row holding one value). Callbacks are fallible and their
//! errors propagate unchanged; no operator returns partial results.
//!
//! Results are built through [`RangeValue::rebuild`] or as detached grids,
//! so none of them keeps an origin.

use std::collections::HashSet;

use super::range::{GridValue, Range, RangeValue};
use super::row::RowView;
use super::value::{CellValue, RawGrid, sort_order};
use crate::error::QueryError;

/// Row identity separator used by [`distinct`].
const ROW_KEY_SEPARATOR: char = '\u{1f}';

/// Grid of derived rows that no longer line up with the source columns.
fn detached<R: RangeValue + ?Sized>(range: &R, rows: RawGrid) -> Range {
    if range.is_scalar() {
        range.rebuild(rows)
    } else {
        Range::Grid(GridValue::new(rows))
    }
}

/// Keep the rows matching `pred`.
pub fn filter<R, E, F>(range: &R, mut pred: F) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    let mut kept = Vec::new();
    for row in range.row_views() {
        if pred(&row)? {
            kept.push(row.into_values());
        }
    }
    Ok(range.rebuild(kept))
}

/// Project each row to one value; the result has a single column.
pub fn select<R, E, F>(range: &R, mut selector: F) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<CellValue, E>,
{
    let mut rows = Vec::with_capacity(range.len());
    for row in range.row_views() {
        rows.push(vec![selector(&row)?]);
    }
    Ok(detached(range, rows))
}

/// Project each row to a sequence and flatten into one column.
pub fn select_many<R, E, F>(range: &R, mut selector: F) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<Vec<CellValue>, E>,
{
    let mut rows = Vec::new();
    for row in range.row_views() {
        rows.extend(selector(&row)?.into_iter().map(|v| vec![v]));
    }
    Ok(detached(range, rows))
}

pub fn any<R, E, F>(range: &R, mut pred: F) -> Result<bool, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    for row in range.row_views() {
        if pred(&row)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn all<R, E, F>(range: &R, mut pred: F) -> Result<bool, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    for row in range.row_views() {
        if !pred(&row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// First row matching `pred`, if any.
pub fn find_first<R, E, F>(range: &R, mut pred: F) -> Result<Option<RowView>, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    for row in range.row_views() {
        if pred(&row)? {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

/// First row matching `pred`; fails when nothing matches.
pub fn first<R, E, F>(range: &R, pred: F) -> Result<RowView, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    find_first(range, pred)?.ok_or_else(|| QueryError::NoMatch.into())
}

pub fn count<R, E, F>(range: &R, mut pred: F) -> Result<usize, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<bool, E>,
{
    let mut n = 0;
    for row in range.row_views() {
        if pred(&row)? {
            n += 1;
        }
    }
    Ok(n)
}

/// Every value of every row, coerced to a number.
pub fn numbers<R: RangeValue + ?Sized>(range: &R) -> Result<Vec<f64>, QueryError> {
    range
        .row_views()
        .iter()
        .flat_map(|row| row.values().iter().map(CellValue::to_number).collect::<Vec<_>>())
        .collect()
}

/// One number per row, produced by `selector`.
pub fn numbers_by<R, E, F>(range: &R, mut selector: F) -> Result<Vec<f64>, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<CellValue, E>,
{
    let mut out = Vec::with_capacity(range.len());
    for row in range.row_views() {
        out.push(selector(&row)?.to_number()?);
    }
    Ok(out)
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Mean of `values`; zero when there are none.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        sum(values) / values.len() as f64
    }
}

pub fn min(values: &[f64]) -> Result<f64, QueryError> {
    values
        .iter()
        .copied()
        .reduce(f64::min)
        .ok_or(QueryError::EmptyAggregation("min"))
}

pub fn max(values: &[f64]) -> Result<f64, QueryError> {
    values
        .iter()
        .copied()
        .reduce(f64::max)
        .ok_or(QueryError::EmptyAggregation("max"))
}

/// Shape-preserving map: each output row holds the first
/// `min(result width, row width)` values of the mapped result.
pub fn map<R, E, F>(range: &R, mut mapper: F) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<Vec<CellValue>, E>,
{
    let mut rows = Vec::with_capacity(range.len());
    for row in range.row_views() {
        let mut mapped = mapper(&row)?;
        mapped.truncate(row.len());
        rows.push(mapped);
    }
    Ok(range.rebuild(rows))
}

/// Stable sort by a key computed once per row.
pub fn order_by<R, E, F>(range: &R, mut key: F, descending: bool) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(&RowView) -> Result<CellValue, E>,
{
    let mut keyed = Vec::with_capacity(range.len());
    for row in range.row_views() {
        keyed.push((key(&row)?, row.into_values()));
    }
    if descending {
        keyed.sort_by(|a, b| sort_order(&b.0, &a.0));
    } else {
        keyed.sort_by(|a, b| sort_order(&a.0, &b.0));
    }
    Ok(range.rebuild(keyed.into_iter().map(|(_, row)| row).collect()))
}

/// Bounds of the rows kept by `take(n)`; negative `n` counts from the end.
fn take_bounds(len: usize, n: i64) -> (usize, usize) {
    let k = (n.unsigned_abs() as usize).min(len);
    if n >= 0 { (0, k) } else { (len - k, len) }
}

pub fn take<R: RangeValue + ?Sized>(range: &R, n: i64) -> Range {
    let rows = range.to_grid();
    let (start, end) = take_bounds(rows.len(), n);
    range.rebuild(rows[start..end].to_vec())
}

pub fn skip<R: RangeValue + ?Sized>(range: &R, n: i64) -> Range {
    let rows = range.to_grid();
    let len = rows.len();
    let k = (n.unsigned_abs() as usize).min(len);
    let kept = if n >= 0 {
        rows[k..].to_vec()
    } else {
        rows[..len - k].to_vec()
    };
    range.rebuild(kept)
}

fn row_key(row: &[CellValue]) -> String {
    let mut key = String::new();
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            key.push(ROW_KEY_SEPARATOR);
        }
        key.push_str(&value.to_string());
    }
    key
}

/// Drop rows whose stringified values repeat an earlier row.
pub fn distinct<R: RangeValue + ?Sized>(range: &R) -> Range {
    let mut seen = HashSet::new();
    let rows = range
        .to_grid()
        .into_iter()
        .filter(|row| seen.insert(row_key(row)))
        .collect();
    range.rebuild(rows)
}

/// Left fold over the rows.
pub fn aggregate<R, A, E, F>(range: &R, seed: A, mut fold: F) -> Result<A, E>
where
    R: RangeValue + ?Sized,
    E: From<QueryError>,
    F: FnMut(A, &RowView) -> Result<A, E>,
{
    let mut acc = seed;
    for row in range.row_views() {
        acc = fold(acc, &row)?;
    }
    Ok(acc)
}

/// Running fold: one output row per input row holding the accumulator.
pub fn scan<R, A, E, F, G>(range: &R, seed: A, mut fold: F, mut to_row: G) -> Result<Range, E>
where
    R: RangeValue + ?Sized,
    A: Clone,
    E: From<QueryError>,
    F: FnMut(A, &RowView) -> Result<A, E>,
    G: FnMut(&A) -> Result<Vec<CellValue>, E>,
{
    let mut acc = seed;
    let mut rows = Vec::with_capacity(range.len());
    for row in range.row_views() {
        acc = fold(acc, &row)?;
        rows.push(to_row(&acc)?);
    }
    Ok(detached(range, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::escalation::Origin;
    use crate::engine::range::{ScalarValue, TableValue};
    use crate::engine::value::compare;
    use std::cmp::Ordering;

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn column_grid(values: &[f64]) -> GridValue {
        GridValue::new(values.iter().map(|v| vec![n(*v)]).collect())
    }

    fn greater_than(limit: f64) -> impl FnMut(&RowView) -> Result<bool, QueryError> {
        move |row| Ok(compare(row.single()?, &n(limit)) == Some(Ordering::Greater))
    }

    fn people() -> TableValue {
        TableValue::new(
            vec!["Name".to_string(), "Age".to_string()],
            vec![
                vec![CellValue::text("Alice"), n(30.0)],
                vec![CellValue::text("Bob"), n(25.0)],
            ],
        )
    }

    #[test]
    fn scenario_filter_sum_average() {
        let grid = column_grid(&[1.0, 2.0, 3.0]);
        let filtered = filter(&grid, greater_than(1.0)).unwrap();
        assert_eq!(filtered.to_grid(), vec![vec![n(2.0)], vec![n(3.0)]]);

        let values = numbers(&grid).unwrap();
        assert_eq!(sum(&values), 6.0);
        assert_eq!(average(&values), 2.0);
    }

    #[test]
    fn scenario_table_named_filter_count() {
        let table = people();
        let older = count(&table, |row: &RowView| {
            Ok::<_, QueryError>(row.named("Age")?.to_number()? > 28.0)
        })
        .unwrap();
        assert_eq!(older, 1);
    }

    #[test]
    fn filter_is_idempotent() {
        let grid = column_grid(&[5.0, 1.0, 7.0, 2.0]);
        let once = filter(&grid, greater_than(2.0)).unwrap();
        let twice = filter(&once, greater_than(2.0)).unwrap();
        assert_eq!(once.to_grid(), twice.to_grid());
    }

    #[test]
    fn distinct_is_idempotent_and_keeps_first_occurrence() {
        let grid = GridValue::new(vec![
            vec![n(1.0), CellValue::text("a")],
            vec![n(2.0), CellValue::text("b")],
            vec![n(1.0), CellValue::text("a")],
        ]);
        let once = distinct(&grid);
        assert_eq!(once.len(), 2);
        assert_eq!(distinct(&once).to_grid(), once.to_grid());
    }

    #[test]
    fn take_and_skip_accept_negative_counts() {
        let grid = column_grid(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(take(&grid, 2).to_grid(), vec![vec![n(1.0)], vec![n(2.0)]]);
        assert_eq!(take(&grid, -1).to_grid(), vec![vec![n(4.0)]]);
        assert_eq!(skip(&grid, 3).to_grid(), vec![vec![n(4.0)]]);
        assert_eq!(skip(&grid, -3).to_grid(), vec![vec![n(1.0)]]);
        assert!(take(&grid, 10).len() == 4 && skip(&grid, 10).is_empty());
    }

    #[test]
    fn order_by_is_stable_in_both_directions() {
        let grid = GridValue::new(vec![
            vec![n(2.0), CellValue::text("x")],
            vec![n(1.0), CellValue::text("y")],
            vec![n(2.0), CellValue::text("z")],
        ]);
        let key = |row: &RowView| Ok::<_, QueryError>(row.values()[0].clone());
        let asc = order_by(&grid, key, false).unwrap().to_grid();
        let labels: Vec<_> = asc.iter().map(|r| r[1].to_string()).collect();
        assert_eq!(labels, ["y", "x", "z"]);

        let desc = order_by(&grid, key, true).unwrap().to_grid();
        let labels: Vec<_> = desc.iter().map(|r| r[1].to_string()).collect();
        assert_eq!(labels, ["x", "z", "y"]);
    }

    #[test]
    fn map_truncates_to_the_narrower_width() {
        let grid = GridValue::new(vec![vec![n(1.0), n(2.0)]]);
        let widened = map(&grid, |row: &RowView| {
            let mut out = row.values().to_vec();
            out.push(n(99.0));
            Ok::<_, QueryError>(out)
        })
        .unwrap();
        assert_eq!(widened.to_grid(), vec![vec![n(1.0), n(2.0)]]);

        let narrowed = map(&grid, |_: &RowView| Ok::<_, QueryError>(vec![n(7.0)])).unwrap();
        assert_eq!(narrowed.to_grid(), vec![vec![n(7.0)]]);
    }

    #[test]
    fn empty_min_max_fail_but_sum_and_average_are_zero() {
        let empty = GridValue::empty();
        let values = numbers(&empty).unwrap();
        assert_eq!(sum(&values), 0.0);
        assert_eq!(average(&values), 0.0);
        assert_eq!(min(&values), Err(QueryError::EmptyAggregation("min")));
        assert_eq!(max(&values), Err(QueryError::EmptyAggregation("max")));
    }

    #[test]
    fn scan_emits_running_totals() {
        let grid = column_grid(&[1.0, 2.0, 3.0]);
        let totals = scan(
            &grid,
            0.0,
            |acc, row: &RowView| Ok::<_, QueryError>(acc + row.single()?.to_number()?),
            |acc| Ok(vec![n(*acc)]),
        )
        .unwrap();
        assert_eq!(
            totals.to_grid(),
            vec![vec![n(1.0)], vec![n(3.0)], vec![n(6.0)]]
        );
    }

    #[test]
    fn predicate_errors_abort_the_operation() {
        let grid = column_grid(&[1.0, 2.0]);
        let result = filter(&grid, |_: &RowView| Err::<bool, _>(QueryError::NoMatch));
        assert_eq!(result.unwrap_err(), QueryError::NoMatch);
    }

    #[test]
    fn scalar_follows_degenerate_semantics() {
        let scalar = ScalarValue::new(n(5.0));
        assert!(matches!(
            filter(&scalar, greater_than(1.0)).unwrap(),
            Range::Scalar(_)
        ));
        let none = filter(&scalar, greater_than(10.0)).unwrap();
        assert!(matches!(none, Range::Grid(_)) && none.is_empty());

        assert!(take(&scalar, 0).is_empty());
        assert!(matches!(take(&scalar, 3), Range::Scalar(_)));
        assert!(matches!(skip(&scalar, 0), Range::Scalar(_)));
        assert!(skip(&scalar, 1).is_empty());

        let mut calls = 0;
        let folded = aggregate(&scalar, 10.0, |acc, row: &RowView| {
            calls += 1;
            Ok::<_, QueryError>(acc + row.single()?.to_number()?)
        })
        .unwrap();
        assert_eq!((folded, calls), (15.0, 1));
    }

    #[test]
    fn every_derived_range_loses_escalation() {
        let origin = Origin::new("S1", 1, 1);
        let table = people().with_origin(origin, None);
        let always = |_: &RowView| Ok::<_, QueryError>(true);
        let first_col = |row: &RowView| Ok::<_, QueryError>(row.values()[0].clone());

        let derived = vec![
            filter(&table, always).unwrap(),
            order_by(&table, first_col, false).unwrap(),
            take(&table, 1),
            skip(&table, 0),
            distinct(&table),
            select(&table, first_col).unwrap(),
            map(&table, |row: &RowView| Ok::<_, QueryError>(row.values().to_vec())).unwrap(),
        ];
        for range in derived {
            assert!(range.origin().is_none());
            assert!(matches!(
                range.cells(),
                Err(QueryError::CellAccessUnavailable(_))
            ));
        }
    }
}
