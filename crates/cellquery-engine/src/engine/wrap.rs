//! Turn a raw argument into one of the three range shapes.

use rhai::{Array, Dynamic};

use super::bridge::HostBridges;
use super::normalize::{cell_value_of, row_values_of};
use super::range::{Range, ScalarValue};
use super::value::RawGrid;
use crate::error::QueryError;

/// Wrap one argument.
///
/// Already wrapped values pass through untouched. Host handles are pulled
/// through the bridges; the origin is only requested when the expression
/// escalates to cell metadata. Anything else is treated as materialized
/// data.
pub fn wrap_argument(
    raw: Dynamic,
    escalate: bool,
    bridges: &HostBridges,
) -> Result<Range, QueryError> {
    if let Some(range) = Range::from_dynamic(&raw) {
        return Ok(range);
    }
    if bridges.is_handle(&raw) {
        let rows = bridges.raw_values(&raw).map_err(QueryError::Bridge)?;
        let headers = bridges.headers(&raw);
        let origin = if escalate { bridges.origin(&raw) } else { None };
        tracing::trace!(
            rows = rows.len(),
            headers = headers.is_some(),
            anchored = origin.is_some(),
            "wrapped host handle"
        );
        return Ok(Range::from_parts(rows, headers, origin, bridges.resolver()));
    }
    wrap_materialized(raw)
}

fn wrap_materialized(raw: Dynamic) -> Result<Range, QueryError> {
    if let Some(grid) = raw.clone().try_cast::<RawGrid>() {
        return Ok(Range::from_parts(grid, None, None, None));
    }
    if raw.is_array() {
        let items: Array = raw
            .into_array()
            .map_err(|t| QueryError::Unsupported(t.to_string()))?;
        let rows = if !items.is_empty() && items.iter().all(Dynamic::is_array) {
            items
                .iter()
                .map(row_values_of)
                .collect::<Result<RawGrid, _>>()?
        } else {
            items
                .iter()
                .map(|item| cell_value_of(item).map(|v| vec![v]))
                .collect::<Result<RawGrid, _>>()?
        };
        // A lone value wraps as a scalar whichever way it was nested.
        return Ok(Range::from_parts(rows, None, None, None));
    }
    Ok(Range::Scalar(ScalarValue::new(cell_value_of(&raw)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::range::{GridValue, RangeValue};
    use crate::engine::value::CellValue;
    use crate::engine::snapshot::CellSnapshot;

    #[derive(Clone)]
    struct Handle(&'static str);

    fn bridges() -> HostBridges {
        HostBridges::new(
            |v| v.is::<Handle>(),
            |v| match v.clone().cast::<Handle>().0 {
                "people" => Ok(vec![
                    vec![CellValue::text("Alice"), CellValue::Number(30.0)],
                    vec![CellValue::text("Bob"), CellValue::Number(25.0)],
                ]),
                "one" => Ok(vec![vec![CellValue::Number(7.0)]]),
                other => Err(format!("unknown handle {}", other)),
            },
        )
        .with_headers(|v| {
            (v.clone().cast::<Handle>().0 == "people")
                .then(|| vec!["Name".to_string(), "Age".to_string()])
        })
        .with_origin(|_| Some(("Sheet1".to_string(), 2, 1)))
        .with_cell_resolver(|sheet, row, col| {
            Ok(CellSnapshot {
                address: format!("{}!{}:{}", sheet, row, col),
                row,
                col,
                ..CellSnapshot::default()
            })
        })
    }

    #[test]
    fn header_handles_become_tables() {
        let range = wrap_argument(Dynamic::from(Handle("people")), false, &bridges()).unwrap();
        assert!(matches!(range, Range::Table(_)));
        assert_eq!(range.len(), 2);
        assert!(range.origin().is_none());
    }

    #[test]
    fn origin_is_only_fetched_when_escalating() {
        let range = wrap_argument(Dynamic::from(Handle("one")), true, &bridges()).unwrap();
        assert!(matches!(range, Range::Scalar(_)));
        let cell = range.cells().unwrap().remove(0);
        assert_eq!((cell.row, cell.col), (2, 1));
    }

    #[test]
    fn bridge_failures_surface() {
        let err = wrap_argument(Dynamic::from(Handle("nope")), false, &bridges()).unwrap_err();
        assert!(matches!(err, QueryError::Bridge(_)));
    }

    #[test]
    fn materialized_data_wraps_by_shape() {
        let b = HostBridges::detached();
        let scalar = wrap_argument(Dynamic::from(3.5_f64), false, &b).unwrap();
        assert!(matches!(scalar, Range::Scalar(_)));

        let flat: Array = vec![Dynamic::from(1_i64), Dynamic::from(2_i64)];
        let column = wrap_argument(Dynamic::from(flat), false, &b).unwrap();
        assert_eq!((column.len(), column.width()), (2, 1));

        let nested: Array = vec![Dynamic::from(vec![Dynamic::from(1_i64), Dynamic::from(2_i64)])];
        let grid = wrap_argument(Dynamic::from(nested), false, &b).unwrap();
        assert_eq!((grid.len(), grid.width()), (1, 2));
    }

    #[test]
    fn single_materialized_values_wrap_as_scalars() {
        let b = HostBridges::detached();
        let flat: Array = vec![Dynamic::from(5_i64)];
        let nested: Array = vec![Dynamic::from(vec![Dynamic::from(5_i64)])];
        for raw in [Dynamic::from(flat), Dynamic::from(nested)] {
            let range = wrap_argument(raw, false, &b).unwrap();
            assert!(matches!(range, Range::Scalar(_)));
            assert_eq!(range.to_grid(), vec![vec![CellValue::Number(5.0)]]);
        }
    }

    #[test]
    fn wrapped_values_pass_through() {
        let b = HostBridges::detached();
        let original =
            Range::Grid(GridValue::new(vec![vec![CellValue::Number(1.0)]])).into_dynamic();
        let again = wrap_argument(original, true, &b).unwrap();
        assert_eq!(again.to_grid(), vec![vec![CellValue::Number(1.0)]]);
    }
}
