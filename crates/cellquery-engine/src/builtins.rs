//! Rhai registration of the value model.
//!
//! Conventions:
//! - Range methods use the query names user code is written against
//!   (`where`, `select`, `orderByDescending`, ...).
//! - Internal helpers called by emitted units are prefixed `__cq_`.
//! - Every fallible registration returns the typed [`QueryError`] wrapped
//!   in a Rhai runtime error; nothing is swallowed.

use std::cmp::Ordering;

use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FLOAT, FnPtr, INT, ImmutableString, NativeCallContext,
    Variant,
};

use crate::engine::query;
use crate::engine::{
    CellSnapshot, CellValue, ColumnValue, Font, GridValue, HostBridges, Interior, NormalizedGrid,
    Origin, RangeValue, RowView, ScalarValue, TableValue, arithmetic, cell_value_of,
    compare_strict, normalize, row_values_of, sequence_values_of, values_equal, wrap_argument,
};
use crate::error::QueryError;

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// Name of the internal wrapping helper called by emitted units.
pub const WRAP_FN: &str = "__cq_wrap";
/// Name of the internal normalizing helper called by emitted units.
pub const NORMALIZE_FN: &str = "__cq_normalize";

/// Names of the range contract's own members. Identifiers with these names
/// are never treated as variables by expression analysis.
pub const RANGE_MEMBERS: &[&str] = &[
    "rows",
    "cells",
    "cell",
    "origin",
    "headers",
    "width",
    "value",
    "where",
    "select",
    "selectMany",
    "any",
    "all",
    "first",
    "firstOrDefault",
    "count",
    "sum",
    "min",
    "max",
    "average",
    "map",
    "orderBy",
    "orderByDescending",
    "take",
    "skip",
    "distinct",
    "aggregate",
    "scan",
    "len",
    "values",
    "to_float",
    "to_int",
    "to_string",
    "to_bool",
    "is_empty",
];

fn call_with_row(ctx: &NativeCallContext, f: &FnPtr, row: &RowView) -> RhaiResult<Dynamic> {
    f.call_within_context(ctx, (row.clone(),))
}

/// Interpret a predicate result. Booleans pass through; wrapped values are
/// coerced.
fn truthy(value: &Dynamic) -> Result<bool, QueryError> {
    if let Ok(b) = value.as_bool() {
        return Ok(b);
    }
    cell_value_of(value)?.to_bool()
}

fn predicate<'a>(
    ctx: &'a NativeCallContext,
    f: &'a FnPtr,
) -> impl FnMut(&RowView) -> RhaiResult<bool> + 'a {
    move |row| Ok(truthy(&call_with_row(ctx, f, row)?)?)
}

fn selector<'a>(
    ctx: &'a NativeCallContext,
    f: &'a FnPtr,
) -> impl FnMut(&RowView) -> RhaiResult<CellValue> + 'a {
    move |row| Ok(cell_value_of(&call_with_row(ctx, f, row)?)?)
}

fn float(value: Result<f64, QueryError>) -> RhaiResult<FLOAT> {
    Ok(value?)
}

fn snapshots_to_array(cells: Vec<CellSnapshot>) -> Array {
    cells.into_iter().map(Dynamic::from).collect()
}

fn index_of(value: &CellValue) -> Result<i64, QueryError> {
    Ok(value.to_number()?.trunc() as i64)
}

fn strings_to_array(names: &[String]) -> Array {
    names.iter().map(|n| Dynamic::from(n.clone())).collect()
}

/// Register the range contract for one shape.
fn register_range_api<R>(engine: &mut Engine, headers: fn(&R) -> Option<Vec<String>>)
where
    R: RangeValue + Variant + Clone + IntoIterator<Item = RowView>,
{
    engine.register_iterator::<R>();

    engine.register_get("rows", |r: &mut R| r.clone());
    engine.register_get("cells", |r: &mut R| -> RhaiResult<Array> {
        Ok(snapshots_to_array(r.cells()?))
    });
    engine.register_get("origin", |r: &mut R| -> Dynamic {
        r.origin().cloned().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_get("headers", move |r: &mut R| -> Dynamic {
        headers(r)
            .map(|names| Dynamic::from(strings_to_array(&names)))
            .unwrap_or(Dynamic::UNIT)
    });
    engine.register_get("width", |r: &mut R| r.width() as INT);
    engine.register_indexer_get(|r: &mut R, index: INT| -> RhaiResult<RowView> {
        Ok(r.row(index)?)
    });

    engine.register_indexer_get(|r: &mut R, index: ScalarValue| -> RhaiResult<RowView> {
        Ok(r.row(index_of(index.value())?)?)
    });

    engine.register_fn("len", |r: &mut R| r.len() as INT);
    engine.register_fn("is_empty", |r: &mut R| r.is_empty());

    engine.register_fn(
        "where",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            Ok(query::filter(&*r, predicate(&ctx, &f))?.into_dynamic())
        },
    );
    engine.register_fn(
        "select",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            Ok(query::select(&*r, selector(&ctx, &f))?.into_dynamic())
        },
    );
    engine.register_fn(
        "selectMany",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            let out = query::select_many(&*r, |row| -> RhaiResult<Vec<CellValue>> {
                Ok(sequence_values_of(&call_with_row(&ctx, &f, row)?)?)
            })?;
            Ok(out.into_dynamic())
        },
    );

    engine.register_fn("any", |r: &mut R| !r.is_empty());
    engine.register_fn(
        "any",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<bool> {
            query::any(&*r, predicate(&ctx, &f))
        },
    );
    engine.register_fn(
        "all",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<bool> {
            query::all(&*r, predicate(&ctx, &f))
        },
    );

    engine.register_fn("first", |r: &mut R| -> RhaiResult<RowView> {
        Ok(query::first::<_, QueryError, _>(&*r, |_| Ok(true))?)
    });
    engine.register_fn(
        "first",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<RowView> {
            query::first(&*r, predicate(&ctx, &f))
        },
    );
    engine.register_fn("firstOrDefault", |r: &mut R| -> Dynamic {
        r.row_views()
            .into_iter()
            .next()
            .map(Dynamic::from)
            .unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn(
        "firstOrDefault",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            Ok(query::find_first(&*r, predicate(&ctx, &f))?
                .map(Dynamic::from)
                .unwrap_or(Dynamic::UNIT))
        },
    );

    engine.register_fn("count", |r: &mut R| r.len() as INT);
    engine.register_fn(
        "count",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<INT> {
            Ok(query::count(&*r, predicate(&ctx, &f))? as INT)
        },
    );

    engine.register_fn("sum", |r: &mut R| -> RhaiResult<FLOAT> {
        float(query::numbers(&*r).map(|v| query::sum(&v)))
    });
    engine.register_fn("average", |r: &mut R| -> RhaiResult<FLOAT> {
        float(query::numbers(&*r).map(|v| query::average(&v)))
    });
    engine.register_fn("min", |r: &mut R| -> RhaiResult<FLOAT> {
        float(query::numbers(&*r).and_then(|v| query::min(&v)))
    });
    engine.register_fn("max", |r: &mut R| -> RhaiResult<FLOAT> {
        float(query::numbers(&*r).and_then(|v| query::max(&v)))
    });
    engine.register_fn(
        "sum",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<FLOAT> {
            Ok(query::sum(&query::numbers_by(&*r, selector(&ctx, &f))?))
        },
    );
    engine.register_fn(
        "average",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<FLOAT> {
            Ok(query::average(&query::numbers_by(&*r, selector(&ctx, &f))?))
        },
    );
    engine.register_fn(
        "min",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<FLOAT> {
            float(query::min(&query::numbers_by(&*r, selector(&ctx, &f))?))
        },
    );
    engine.register_fn(
        "max",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<FLOAT> {
            float(query::max(&query::numbers_by(&*r, selector(&ctx, &f))?))
        },
    );

    engine.register_fn(
        "map",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            let out = query::map(&*r, |row| -> RhaiResult<Vec<CellValue>> {
                Ok(row_values_of(&call_with_row(&ctx, &f, row)?)?)
            })?;
            Ok(out.into_dynamic())
        },
    );
    engine.register_fn(
        "orderBy",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            Ok(query::order_by(&*r, selector(&ctx, &f), false)?.into_dynamic())
        },
    );
    engine.register_fn(
        "orderByDescending",
        |ctx: NativeCallContext, r: &mut R, f: FnPtr| -> RhaiResult<Dynamic> {
            Ok(query::order_by(&*r, selector(&ctx, &f), true)?.into_dynamic())
        },
    );
    engine.register_fn("take", |r: &mut R, n: INT| query::take(&*r, n).into_dynamic());
    engine.register_fn("skip", |r: &mut R, n: INT| query::skip(&*r, n).into_dynamic());
    engine.register_fn("distinct", |r: &mut R| query::distinct(&*r).into_dynamic());

    engine.register_fn(
        "aggregate",
        |ctx: NativeCallContext, r: &mut R, seed: Dynamic, f: FnPtr| -> RhaiResult<Dynamic> {
            query::aggregate(&*r, seed, |acc, row| {
                f.call_within_context(&ctx, (acc, row.clone()))
            })
        },
    );
    engine.register_fn(
        "scan",
        |ctx: NativeCallContext, r: &mut R, seed: Dynamic, f: FnPtr| -> RhaiResult<Dynamic> {
            let out = query::scan(
                &*r,
                seed,
                |acc, row| f.call_within_context(&ctx, (acc, row.clone())),
                |acc| -> RhaiResult<Vec<CellValue>> { Ok(row_values_of(acc)?) },
            )?;
            Ok(out.into_dynamic())
        },
    );
}

fn register_row_api(engine: &mut Engine) {
    engine.register_iterator::<RowView>();
    engine.register_indexer_get(|row: &mut RowView, index: INT| -> RhaiResult<ColumnValue> {
        Ok(row.at(index)?)
    });
    // Also serves `row.name` through Rhai's property fallback.
    engine.register_indexer_get(
        |row: &mut RowView, name: ImmutableString| -> RhaiResult<ColumnValue> {
            Ok(row.named(&name)?)
        },
    );
    // Free variables arrive wrapped, so `row[key]` may see a scalar key.
    engine.register_indexer_get(
        |row: &mut RowView, key: ScalarValue| -> RhaiResult<ColumnValue> {
            match key.value() {
                CellValue::Text(name) => Ok(row.named(name)?),
                other => Ok(row.at(index_of(other)?)?),
            }
        },
    );
    engine.register_get("cells", |row: &mut RowView| -> RhaiResult<Array> {
        Ok(snapshots_to_array(row.cells()?))
    });
    engine.register_fn("len", |row: &mut RowView| row.len() as INT);
    engine.register_fn("count", |row: &mut RowView| row.len() as INT);
    engine.register_fn("values", |row: &mut RowView| -> Array {
        row.values().iter().map(CellValue::to_dynamic).collect()
    });
    engine.register_fn("to_string", |row: &mut RowView| {
        let parts: Vec<String> = row.values().iter().map(ToString::to_string).collect();
        format!("[{}]", parts.join(", "))
    });
}

fn register_column_api(engine: &mut Engine) {
    engine.register_get("value", |c: &mut ColumnValue| c.value().to_dynamic());
    engine.register_get("cell", |c: &mut ColumnValue| -> RhaiResult<CellSnapshot> {
        Ok(c.cell()?)
    });
    engine.register_fn("to_float", |c: &mut ColumnValue| -> RhaiResult<FLOAT> {
        float(c.to_number())
    });
    engine.register_fn("to_int", |c: &mut ColumnValue| -> RhaiResult<INT> {
        Ok(c.to_number()?.trunc() as INT)
    });
    engine.register_fn("to_bool", |c: &mut ColumnValue| -> RhaiResult<bool> {
        Ok(c.to_bool()?)
    });
    engine.register_fn("to_string", |c: &mut ColumnValue| c.to_text());
    engine.register_fn("is_empty", |c: &mut ColumnValue| c.value().is_empty());

    engine.register_get("value", |s: &mut ScalarValue| s.value().to_dynamic());
    engine.register_fn("to_string", |s: &mut ScalarValue| s.value().to_string());
}

fn register_snapshot_api(engine: &mut Engine) {
    engine.register_get("value", |c: &mut CellSnapshot| c.value.to_dynamic());
    engine.register_get("formula", |c: &mut CellSnapshot| c.formula.clone());
    engine.register_get("number_format", |c: &mut CellSnapshot| c.number_format.clone());
    engine.register_get("address", |c: &mut CellSnapshot| c.address.clone());
    engine.register_get("row", |c: &mut CellSnapshot| c.row as INT);
    engine.register_get("col", |c: &mut CellSnapshot| c.col as INT);
    engine.register_get("interior", |c: &mut CellSnapshot| c.interior.clone());
    engine.register_get("font", |c: &mut CellSnapshot| c.font.clone());
    engine.register_get("color", |c: &mut CellSnapshot| c.color());
    engine.register_get("color_index", |c: &mut CellSnapshot| c.color_index());
    engine.register_get("pattern", |c: &mut CellSnapshot| c.pattern());
    engine.register_get("bold", |c: &mut CellSnapshot| c.bold());
    engine.register_get("italic", |c: &mut CellSnapshot| c.italic());
    engine.register_get("font_size", |c: &mut CellSnapshot| c.font_size());
    engine.register_get("font_name", |c: &mut CellSnapshot| c.font_name().to_string());
    engine.register_get("font_color", |c: &mut CellSnapshot| c.font_color());
    engine.register_get("has_formula", |c: &mut CellSnapshot| c.has_formula());
    engine.register_fn("to_string", |c: &mut CellSnapshot| c.address.clone());

    engine.register_get("color_index", |i: &mut Interior| i.color_index);
    engine.register_get("color", |i: &mut Interior| i.color);
    engine.register_get("pattern", |i: &mut Interior| i.pattern);

    engine.register_get("bold", |f: &mut Font| f.bold);
    engine.register_get("italic", |f: &mut Font| f.italic);
    engine.register_get("size", |f: &mut Font| f.size);
    engine.register_get("name", |f: &mut Font| f.name.clone());
    engine.register_get("color", |f: &mut Font| f.color);

    engine.register_get("sheet", |o: &mut Origin| o.sheet.clone());
    engine.register_get("top", |o: &mut Origin| o.top as INT);
    engine.register_get("left", |o: &mut Origin| o.left as INT);
}

/// Values that take part in comparisons and arithmetic as a single cell.
trait Operand: Variant + Clone {
    fn operand(&self) -> Result<CellValue, QueryError>;
}

impl Operand for ColumnValue {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(self.value().clone())
    }
}

impl Operand for RowView {
    fn operand(&self) -> Result<CellValue, QueryError> {
        self.single().cloned()
    }
}

impl Operand for ScalarValue {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(self.value().clone())
    }
}

impl Operand for INT {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(CellValue::from(*self))
    }
}

impl Operand for FLOAT {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(CellValue::Number(*self))
    }
}

impl Operand for bool {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(CellValue::Bool(*self))
    }
}

impl Operand for ImmutableString {
    fn operand(&self) -> Result<CellValue, QueryError> {
        Ok(CellValue::text(self.as_str()))
    }
}

fn ordering<A: Operand, B: Operand>(a: &A, b: &B) -> Result<Ordering, QueryError> {
    compare_strict(&a.operand()?, &b.operand()?)
}

fn register_comparisons<A: Operand, B: Operand>(engine: &mut Engine) {
    engine.register_fn("==", |a: A, b: B| -> RhaiResult<bool> {
        Ok(values_equal(&a.operand()?, &b.operand()?))
    });
    engine.register_fn("!=", |a: A, b: B| -> RhaiResult<bool> {
        Ok(!values_equal(&a.operand()?, &b.operand()?))
    });
    engine.register_fn("<", |a: A, b: B| -> RhaiResult<bool> { Ok(ordering(&a, &b)?.is_lt()) });
    engine.register_fn("<=", |a: A, b: B| -> RhaiResult<bool> { Ok(ordering(&a, &b)?.is_le()) });
    engine.register_fn(">", |a: A, b: B| -> RhaiResult<bool> { Ok(ordering(&a, &b)?.is_gt()) });
    engine.register_fn(">=", |a: A, b: B| -> RhaiResult<bool> { Ok(ordering(&a, &b)?.is_ge()) });
}

fn register_arithmetic<A: Operand, B: Operand>(engine: &mut Engine) {
    for op in ["+", "-", "*", "/", "%"] {
        engine.register_fn(op, move |a: A, b: B| -> RhaiResult<FLOAT> {
            Ok(arithmetic(op, &a.operand()?, &b.operand()?)?)
        });
    }
}

/// Operators between a wrapped value `A` and every other operand type.
fn register_operand<A: Operand>(engine: &mut Engine) {
    register_comparisons::<A, ColumnValue>(engine);
    register_comparisons::<A, RowView>(engine);
    register_comparisons::<A, ScalarValue>(engine);
    register_arithmetic::<A, ColumnValue>(engine);
    register_arithmetic::<A, RowView>(engine);
    register_arithmetic::<A, ScalarValue>(engine);

    register_comparisons::<A, INT>(engine);
    register_comparisons::<INT, A>(engine);
    register_arithmetic::<A, INT>(engine);
    register_arithmetic::<INT, A>(engine);

    register_comparisons::<A, FLOAT>(engine);
    register_comparisons::<FLOAT, A>(engine);
    register_arithmetic::<A, FLOAT>(engine);
    register_arithmetic::<FLOAT, A>(engine);

    register_comparisons::<A, bool>(engine);
    register_comparisons::<bool, A>(engine);

    register_comparisons::<A, ImmutableString>(engine);
    register_comparisons::<ImmutableString, A>(engine);
    // Text on either side of `+` concatenates display forms.
    engine.register_fn("+", |a: A, b: ImmutableString| -> RhaiResult<String> {
        Ok(format!("{}{}", a.operand()?, b))
    });
    engine.register_fn("+", |a: ImmutableString, b: A| -> RhaiResult<String> {
        Ok(format!("{}{}", a, b.operand()?))
    });
}

/// Register every type and function an evaluation unit can reach.
pub fn register_builtins(engine: &mut Engine, bridges: HostBridges) {
    engine
        .register_type_with_name::<ScalarValue>("Scalar")
        .register_type_with_name::<GridValue>("Grid")
        .register_type_with_name::<TableValue>("Table")
        .register_type_with_name::<RowView>("Row")
        .register_type_with_name::<ColumnValue>("Column")
        .register_type_with_name::<CellSnapshot>("Cell")
        .register_type_with_name::<Interior>("Interior")
        .register_type_with_name::<Font>("Font")
        .register_type_with_name::<Origin>("Origin")
        .register_type_with_name::<NormalizedGrid>("NormalizedGrid")
        .register_type_with_name::<QueryError>("QueryError");

    // Caught errors print their message, not the type name.
    engine.register_fn("to_string", |e: &mut QueryError| e.to_string());
    engine.register_fn("to_debug", |e: &mut QueryError| format!("{:?}", e));

    register_range_api::<ScalarValue>(engine, |_| None);
    register_range_api::<GridValue>(engine, |g| {
        g.columns().map(|c| c.names().to_vec())
    });
    register_range_api::<TableValue>(engine, |t| Some(t.headers().to_vec()));
    register_row_api(engine);
    register_column_api(engine);
    register_snapshot_api(engine);

    register_operand::<ColumnValue>(engine);
    register_operand::<RowView>(engine);
    register_operand::<ScalarValue>(engine);

    engine.register_fn(
        WRAP_FN,
        move |raw: Dynamic, escalate: bool| -> RhaiResult<Dynamic> {
            Ok(wrap_argument(raw, escalate, &bridges)?.into_dynamic())
        },
    );
    engine.register_fn(NORMALIZE_FN, |value: Dynamic| -> RhaiResult<NormalizedGrid> {
        Ok(NormalizedGrid(normalize(value)?))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::create_engine;
    use crate::error::QueryErrorKind;
    use rhai::Scope;

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
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

    fn snapshot_bridges() -> HostBridges {
        HostBridges::detached().with_cell_resolver(|sheet, row, col| {
            Ok(CellSnapshot {
                address: format!("{}!R{}C{}", sheet, row, col),
                row,
                col,
                ..CellSnapshot::default()
            })
        })
    }

    fn eval<T: Variant + Clone>(scope: &mut Scope, script: &str) -> RhaiResult<T> {
        create_engine(snapshot_bridges()).eval_with_scope::<T>(scope, script)
    }

    fn query_error(err: &EvalAltResult) -> QueryError {
        QueryError::from_rhai(err).unwrap_or_else(|| panic!("untyped error: {}", err))
    }

    #[test]
    fn grid_filter_and_aggregates() {
        let mut scope = Scope::new();
        scope.push("x", GridValue::new(vec![vec![n(1.0)], vec![n(2.0)], vec![n(3.0)]]));

        let filtered = eval::<GridValue>(&mut scope, "x.where(|r| r > 1)").unwrap();
        assert_eq!(filtered.rows(), [vec![n(2.0)], vec![n(3.0)]]);
        assert_eq!(eval::<FLOAT>(&mut scope, "x.sum()").unwrap(), 6.0);
        assert_eq!(eval::<FLOAT>(&mut scope, "x.average()").unwrap(), 2.0);
    }

    #[test]
    fn table_rows_by_name_and_count() {
        let mut scope = Scope::new();
        scope.push("tbl", people());

        assert!(eval::<bool>(&mut scope, r#"tbl.rows[0]["age"] == 30"#).unwrap());
        assert_eq!(
            eval::<INT>(&mut scope, "tbl.rows.where(|r| r.Age > 28).count()").unwrap(),
            1
        );
        assert_eq!(
            eval::<String>(&mut scope, "tbl.orderBy(|r| r.age).first().NAME.to_string()").unwrap(),
            "Bob"
        );
    }

    #[test]
    fn unknown_column_surfaces_typed_error() {
        let mut scope = Scope::new();
        scope.push("tbl", people());
        let err = eval::<Dynamic>(&mut scope, "tbl.where(|r| r.salary > 1)").unwrap_err();
        let typed = query_error(&err);
        assert_eq!(typed.kind(), QueryErrorKind::UnknownColumn);
        assert!(typed.to_string().contains("salary"));
    }

    #[test]
    fn escalation_resolves_on_wrapped_table() {
        let mut scope = Scope::new();
        scope.push(
            "tbl",
            people().with_origin(Origin::new("S1", 1, 1), snapshot_bridges().resolver()),
        );
        assert_eq!(eval::<INT>(&mut scope, "tbl.rows[0][1].cell.row").unwrap(), 1);
        assert_eq!(eval::<INT>(&mut scope, "tbl.rows[0][1].cell.col").unwrap(), 2);
        assert_eq!(eval::<INT>(&mut scope, "tbl.cells.len()").unwrap(), 4);
    }

    #[test]
    fn escalation_fails_after_any_transformation() {
        let mut scope = Scope::new();
        scope.push(
            "tbl",
            people().with_origin(Origin::new("S1", 1, 1), snapshot_bridges().resolver()),
        );
        for script in [
            "tbl.where(|r| true).rows[0][0].cell",
            "tbl.orderBy(|r| r.age).rows[0][0].cell",
            "tbl.take(1).rows[0][0].cell",
            "tbl.skip(0).rows[0][0].cell",
            "tbl.distinct().rows[0][0].cell",
            "tbl.select(|r| r.age).rows[0][0].cell",
            "tbl.map(|r| r).rows[0][0].cell",
        ] {
            let err = eval::<Dynamic>(&mut scope, script).unwrap_err();
            assert_eq!(
                query_error(&err).kind(),
                QueryErrorKind::CellAccessUnavailable,
                "{}",
                script
            );
        }
    }

    #[test]
    fn column_operators_coerce_numbers() {
        let mut scope = Scope::new();
        scope.push("tbl", people());
        assert_eq!(eval::<FLOAT>(&mut scope, "tbl[0].age + 1").unwrap(), 31.0);
        assert_eq!(eval::<FLOAT>(&mut scope, "2.0 * tbl[-1].age").unwrap(), 50.0);
        assert!(eval::<bool>(&mut scope, "tbl[0].age == 30.0").unwrap());
        assert!(!eval::<bool>(&mut scope, r#"tbl[0].age == "30""#).unwrap());
        assert!(eval::<bool>(&mut scope, r#"tbl[0].name < "Bob""#).unwrap());
        assert!(eval::<Dynamic>(&mut scope, r#"tbl[0].name > 1"#).is_err());
        assert_eq!(
            eval::<String>(&mut scope, r#""Hi " + tbl[1].name"#).unwrap(),
            "Hi Bob"
        );
    }

    #[test]
    fn predicate_failures_abort_the_query() {
        let mut scope = Scope::new();
        scope.push("tbl", people());
        let err = eval::<Dynamic>(&mut scope, "tbl.where(|r| r.name + 1 > 0)").unwrap_err();
        assert!(matches!(query_error(&err), QueryError::Coercion { .. }));
    }

    #[test]
    fn folds_and_scans() {
        let mut scope = Scope::new();
        scope.push("x", GridValue::new(vec![vec![n(1.0)], vec![n(2.0)], vec![n(3.0)]]));
        assert_eq!(
            eval::<FLOAT>(&mut scope, "x.aggregate(0.0, |acc, r| acc + r[0])").unwrap(),
            6.0
        );
        let scanned = eval::<GridValue>(&mut scope, "x.scan(0.0, |acc, r| acc + r[0])").unwrap();
        assert_eq!(scanned.rows(), [vec![n(1.0)], vec![n(3.0)], vec![n(6.0)]]);
    }

    #[test]
    fn empty_min_is_an_error() {
        let mut scope = Scope::new();
        scope.push("x", GridValue::empty());
        let err = eval::<Dynamic>(&mut scope, "x.min()").unwrap_err();
        assert!(matches!(query_error(&err), QueryError::EmptyAggregation(_)));
        assert_eq!(eval::<FLOAT>(&mut scope, "x.sum()").unwrap(), 0.0);
    }

    #[test]
    fn scalar_degenerate_semantics() {
        let mut scope = Scope::new();
        scope.push("s", ScalarValue::new(n(5.0)));
        assert!(eval::<bool>(&mut scope, "s.any(|r| r > 4)").unwrap());
        assert!(eval::<bool>(&mut scope, "s.where(|r| r > 10).is_empty()").unwrap());
        assert_eq!(eval::<INT>(&mut scope, "s.take(0).len()").unwrap(), 0);
        assert!(eval::<bool>(&mut scope, "s.skip(0) == 5").unwrap());
        assert_eq!(eval::<FLOAT>(&mut scope, "s * 2").unwrap(), 10.0);
    }

    #[test]
    fn wrap_and_normalize_helpers_round_trip() {
        let mut scope = Scope::new();
        let grid: Array = vec![
            Dynamic::from(vec![Dynamic::from(1 as INT), Dynamic::from(2 as INT)]),
            Dynamic::from(vec![Dynamic::from(3 as INT), Dynamic::from(4 as INT)]),
        ];
        scope.push("raw", grid);
        let out = eval::<NormalizedGrid>(&mut scope, "__cq_normalize(__cq_wrap(raw, false))")
            .unwrap();
        assert_eq!(out.0, vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]]);
    }

    #[test]
    fn narrowed_map_rows_survive_normalization() {
        let mut scope = Scope::new();
        scope.push("g", GridValue::new(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]]));
        let out = eval::<NormalizedGrid>(
            &mut scope,
            "__cq_normalize(g.map(|r| if r[0] == 1 { [9] } else { r }))",
        )
        .unwrap();
        assert_eq!(out.0, vec![vec![n(9.0)], vec![n(3.0), n(4.0)]]);
    }

    #[test]
    fn caught_query_errors_print_their_message() {
        let mut scope = Scope::new();
        scope.push("tbl", people());
        let message = eval::<String>(
            &mut scope,
            "try { tbl.rows[0].salary } catch (e) { e.to_string() }",
        )
        .unwrap();
        assert!(message.starts_with("column not found: 'salary'"), "{}", message);
    }

    #[test]
    fn scalar_keys_index_rows_and_ranges() {
        let mut scope = Scope::new();
        scope.push("tbl", people());
        scope.push("col", ScalarValue::new(CellValue::text("name")));
        scope.push("i", ScalarValue::new(n(-1.0)));

        assert_eq!(
            eval::<String>(&mut scope, "tbl[i][col].to_string()").unwrap(),
            "Bob"
        );
    }
}
