//! CSV import and result export.

use std::path::Path;

use cellquery_engine::engine::{CellValue, RawGrid, format_value};

use crate::config::read_limited;
use crate::error::Result;

const MAX_CSV_FILE_BYTES: u64 = 64 * 1_048_576; // 64 MiB

/// Read a CSV file into a rectangular grid.
pub fn read_csv(path: &Path) -> Result<RawGrid> {
    let content = read_limited(path, MAX_CSV_FILE_BYTES)?;
    let grid = parse_csv(&content);
    tracing::debug!(path = %path.display(), rows = grid.len(), "read csv");
    Ok(grid)
}

/// Parse CSV text; short rows are padded with empty cells.
pub fn parse_csv(content: &str) -> RawGrid {
    let mut rows: RawGrid = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_csv_line(line).iter().map(|f| parse_csv_field(f)).collect())
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, CellValue::Empty);
    }
    rows
}

/// Split one CSV line into fields. Quoted fields keep their whitespace and
/// may contain commas and doubled quotes.
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    let finish = |field: &mut String, quoted: bool| {
        let text = std::mem::take(field);
        if quoted { text } else { text.trim().to_string() }
    };

    while let Some(c) = chars.next() {
        match (in_quotes, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            (true, '"') => in_quotes = false,
            (false, '"') => {
                in_quotes = true;
                quoted = true;
            }
            (false, ',') => {
                fields.push(finish(&mut field, quoted));
                quoted = false;
            }
            (_, c) => field.push(c),
        }
    }
    fields.push(finish(&mut field, quoted));
    fields
}

/// Parse a CSV field into a cell value
/// - Empty string -> Empty
/// - TRUE / FALSE (any case) -> Bool
/// - Valid number -> Number (unless it has leading zeros like "007")
/// - Otherwise -> Text
pub fn parse_csv_field(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }

    // Surrounding whitespace only survives quoting; keep it as text.
    let trimmed = field.trim();
    if field != trimmed {
        return CellValue::text(field);
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }

    if trimmed.starts_with('0')
        && trimmed.len() > 1
        && !trimmed.starts_with("0.")
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return CellValue::text(trimmed);
    }

    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::text(trimmed),
    }
}

/// Render a result grid as CSV text.
pub fn to_csv(grid: &RawGrid) -> String {
    let mut out = String::new();
    for row in grid {
        let fields: Vec<String> = row
            .iter()
            .map(|v| escape_csv_field(&format_value(v)))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '@'))
        || (first_non_space == Some('-') && field.trim().parse::<f64>().is_err())
    {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_line_quoted() {
        assert_eq!(
            parse_csv_line(r#"a,"hello, world",c"#),
            vec!["a", "hello, world", "c"]
        );
        assert_eq!(
            parse_csv_line(r#"a,"say ""hello""",c"#),
            vec!["a", r#"say "hello""#, "c"]
        );
    }

    #[test]
    fn test_parse_csv_line_quoted_preserves_whitespace() {
        assert_eq!(
            parse_csv_line(r#""  keep me  ",x"#),
            vec!["  keep me  ", "x"]
        );
    }

    #[test]
    fn test_parse_csv_field_kinds() {
        assert_eq!(parse_csv_field("42"), CellValue::Number(42.0));
        assert_eq!(parse_csv_field("0"), CellValue::Number(0.0));
        assert_eq!(parse_csv_field("007"), CellValue::text("007"));
        assert_eq!(parse_csv_field("TRUE"), CellValue::Bool(true));
        assert_eq!(parse_csv_field("false"), CellValue::Bool(false));
        assert_eq!(parse_csv_field("inf"), CellValue::text("inf"));
        assert_eq!(parse_csv_field(""), CellValue::Empty);
        assert_eq!(parse_csv_field("  keep me  "), CellValue::text("  keep me  "));
    }

    #[test]
    fn test_parse_csv_pads_short_rows() {
        let grid = parse_csv("Name,Age,City\nAlice,30\n\nBob,25,Paris\n");
        assert_eq!(grid.len(), 3);
        assert!(grid.iter().all(|r| r.len() == 3));
        assert_eq!(grid[1][2], CellValue::Empty);
    }

    #[test]
    fn test_to_csv_escapes_fields() {
        let grid = vec![
            vec![CellValue::text("with,comma"), CellValue::Number(-2.5)],
            vec![CellValue::text("=1+1"), CellValue::Bool(true)],
        ];
        assert_eq!(to_csv(&grid), "\"with,comma\",-2.5\n'=1+1,TRUE\n");
    }

    #[test]
    fn test_escape_csv_field_formula_injection_with_leading_whitespace() {
        assert_eq!(escape_csv_field(" =1+1"), "' =1+1");
        assert_eq!(escape_csv_field("\t-2+3"), "'\t-2+3");
        assert_eq!(escape_csv_field(" \t@cmd"), "' \t@cmd");
    }
}
