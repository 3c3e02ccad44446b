use cellquery_core::storage::{parse_csv, parse_styles};
use cellquery_core::{
    CellValue, EmitOptions, EvaluationUnit, FailureKind, RawGrid, RangeHandle, Workbook,
};
use rhai::{Array, Dynamic, INT};

fn n(v: f64) -> CellValue {
    CellValue::Number(v)
}

fn people() -> Workbook {
    let book = Workbook::new();
    book.add_sheet("people", parse_csv("Name,Age\nAlice,30\nBob,25\n"));
    let styles = parse_styles(
        "[[cells]]\nsheet = \"people\"\naddress = \"B2\"\nbold = true\nformula = \"=20+10\"\n",
    )
    .unwrap();
    book.apply_styles(&styles);
    book
}

fn table(book: &Workbook) -> Dynamic {
    Dynamic::from(book.used_range("people", true).unwrap())
}

fn run(book: &Workbook, expression: &str, args: Vec<Dynamic>) -> cellquery_core::Result<RawGrid> {
    let unit = EvaluationUnit::compile(expression, &EmitOptions::default(), book.bridges())?;
    unit.invoke(args)
}

fn column(values: &[INT]) -> Dynamic {
    let rows: Array = values
        .iter()
        .map(|v| Dynamic::from(vec![Dynamic::from(*v)]))
        .collect();
    Dynamic::from(rows)
}

#[test]
fn grid_filter_and_aggregates() {
    let book = Workbook::new();
    assert_eq!(
        run(&book, "data.where(|x| x > 1)", vec![column(&[1, 2, 3])]).unwrap(),
        vec![vec![n(2.0)], vec![n(3.0)]]
    );
    assert_eq!(
        run(&book, "data.sum()", vec![column(&[1, 2, 3])]).unwrap(),
        vec![vec![n(6.0)]]
    );
    assert_eq!(
        run(&book, "data.average()", vec![column(&[1, 2, 3])]).unwrap(),
        vec![vec![n(2.0)]]
    );
}

#[test]
fn table_handles_resolve_columns_by_name() {
    let book = people();
    assert_eq!(
        run(&book, r#"tbl.rows[0]["age"] == 30"#, vec![table(&book)]).unwrap(),
        vec![vec![CellValue::Bool(true)]]
    );
    assert_eq!(
        run(
            &book,
            r#"|t| t.rows.where(|r| r["Age"] > 28).count()"#,
            vec![table(&book)]
        )
        .unwrap(),
        vec![vec![n(1.0)]]
    );
}

#[test]
fn host_values_bind_as_free_variables() {
    let book = people();
    let unit = EvaluationUnit::compile(
        "tbl.where(|r| r.age > limit).select(|r| r.name)",
        &EmitOptions::named("older than"),
        book.bridges(),
    )
    .unwrap();
    assert_eq!(unit.name(), "OLDERTHAN");
    assert_eq!(unit.parameters(), ["tbl", "limit"]);

    let out = unit
        .invoke_with(|name| match name {
            "tbl" => Some(table(&book)),
            "limit" => Some(Dynamic::from(26 as INT)),
            _ => None,
        })
        .unwrap();
    assert_eq!(out, vec![vec![CellValue::text("Alice")]]);
}

#[test]
fn escalation_reads_host_formatting() {
    let book = people();
    assert_eq!(
        run(&book, "tbl.rows[0][1].cell.bold", vec![table(&book)]).unwrap(),
        vec![vec![CellValue::Bool(true)]]
    );
    assert_eq!(
        run(&book, "tbl.rows[0][1].cell.formula", vec![table(&book)]).unwrap(),
        vec![vec![CellValue::text("=20+10")]]
    );
    assert_eq!(
        run(&book, "tbl.rows[0][1].cell.row", vec![table(&book)]).unwrap(),
        vec![vec![n(2.0)]]
    );
    assert_eq!(
        run(&book, "tbl.cells.len()", vec![table(&book)]).unwrap(),
        vec![vec![n(4.0)]]
    );
}

#[test]
fn escalation_is_lost_after_transformation() {
    let book = people();
    for expression in [
        "tbl.where(|r| true).rows[0][1].cell",
        "tbl.orderBy(|r| r.age).rows[0][1].cell",
        "tbl.take(1).cells",
        "tbl.distinct().rows[0].cells",
    ] {
        let err = run(&book, expression, vec![table(&book)]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::CellAccessUnavailable, "{}", expression);
    }
}

#[test]
fn materialized_data_never_escalates() {
    let book = people();
    let err = run(&book, "data.rows[0][0].cell", vec![column(&[1])]).unwrap_err();
    assert_eq!(err.kind(), FailureKind::CellAccessUnavailable);
}

#[test]
fn unknown_columns_name_the_key() {
    let book = people();
    let err = run(&book, "tbl.rows[0].salary", vec![table(&book)]).unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnknownColumn);
    assert!(err.to_string().contains("salary"));
    assert!(err.to_string().contains("Age"));
}

#[test]
fn missing_sheets_fail_at_wrap_time() {
    let book = people();
    let handle = Dynamic::from(RangeHandle {
        sheet: "archive".into(),
        top: 1,
        left: 1,
        rows: 2,
        cols: 2,
        headers: true,
    });
    let err = run(&book, "tbl.count()", vec![handle]).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Evaluation);
    assert!(err.to_string().contains("archive"));
}

#[test]
fn units_run_on_other_threads() {
    let book = people();
    let unit = EvaluationUnit::compile("t.sum(|r| r.age)", &EmitOptions::default(), book.bridges())
        .unwrap();
    let arg = table(&book);
    let out = std::thread::spawn(move || unit.invoke(vec![arg]))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(out, vec![vec![n(55.0)]]);
}
