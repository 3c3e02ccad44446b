//! Raw cell values and the coercion helpers every accessor goes through.
//!
//! Host data always arrives as [`CellValue`]. Comparison and arithmetic on
//! wrapped values never rely on Rhai's own operator rules; they call the
//! small helpers here instead.

use std::cmp::Ordering;
use std::fmt;

use rhai::{Dynamic, FLOAT, INT};

use crate::error::QueryError;

/// A raw value as stored in a host cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// A plain 2D buffer of raw values, the host's input and output shape.
pub type RawGrid = Vec<Vec<CellValue>>;

impl CellValue {
    pub fn text(s: impl Into<String>) -> CellValue {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Bool(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
        }
    }

    /// Numeric coercion used by aggregations and arithmetic.
    ///
    /// Empty cells count as zero; text must parse as a number.
    pub fn to_number(&self) -> Result<f64, QueryError> {
        match self {
            CellValue::Empty => Ok(0.0),
            CellValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellValue::Number(n) => Ok(*n),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| QueryError::coercion("number", format!("text '{}'", s))),
        }
    }

    pub fn to_bool(&self) -> Result<bool, QueryError> {
        match self {
            CellValue::Empty => Ok(false),
            CellValue::Bool(b) => Ok(*b),
            CellValue::Number(n) => Ok(*n != 0.0),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("false") || trimmed.is_empty() {
                    Ok(false)
                } else {
                    Err(QueryError::coercion("boolean", format!("text '{}'", s)))
                }
            }
        }
    }

    /// Convert into the Rhai value user code sees from `.value`.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            CellValue::Empty => Dynamic::UNIT,
            CellValue::Bool(b) => Dynamic::from(*b),
            CellValue::Number(n) => Dynamic::from(*n as FLOAT),
            CellValue::Text(s) => Dynamic::from(s.clone()),
        }
    }

    /// Convert a primitive Rhai value. Wrapped values are unwrapped by the
    /// callers that know about them (see `normalize::cell_value_of`).
    pub fn from_primitive(value: &Dynamic) -> Option<CellValue> {
        if value.is_unit() {
            return Some(CellValue::Empty);
        }
        if let Ok(b) = value.as_bool() {
            return Some(CellValue::Bool(b));
        }
        if let Ok(n) = value.as_int() {
            return Some(CellValue::Number(n as f64));
        }
        if let Ok(n) = value.as_float() {
            return Some(CellValue::Number(n));
        }
        if let Ok(c) = value.as_char() {
            return Some(CellValue::Text(c.to_string()));
        }
        if value.is_string() {
            return value.clone().into_string().ok().map(CellValue::Text);
        }
        value.clone().try_cast::<CellValue>()
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<INT> for CellValue {
    fn from(n: INT) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Compare two values the way user predicates expect.
///
/// Numbers compare by value, text ordinally, booleans as false < true and
/// two empties are equal. Any other pairing has no ordering.
pub fn compare(left: &CellValue, right: &CellValue) -> Option<Ordering> {
    match (left, right) {
        (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
        (CellValue::Text(a), CellValue::Text(b)) => Some(a.cmp(b)),
        (CellValue::Bool(a), CellValue::Bool(b)) => Some(a.cmp(b)),
        (CellValue::Empty, CellValue::Empty) => Some(Ordering::Equal),
        // An empty cell next to a number behaves as zero.
        (CellValue::Empty, CellValue::Number(b)) => 0.0f64.partial_cmp(b),
        (CellValue::Number(a), CellValue::Empty) => a.partial_cmp(&0.0),
        _ => None,
    }
}

/// Ordering comparison that fails on mismatched types.
pub fn compare_strict(left: &CellValue, right: &CellValue) -> Result<Ordering, QueryError> {
    compare(left, right).ok_or_else(|| QueryError::Incomparable {
        left: describe(left),
        right: describe(right),
    })
}

pub fn values_equal(left: &CellValue, right: &CellValue) -> bool {
    compare(left, right) == Some(Ordering::Equal)
}

/// Total order used for sorting mixed columns.
pub fn sort_order(left: &CellValue, right: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Empty => 0,
            CellValue::Bool(_) => 1,
            CellValue::Number(_) => 2,
            CellValue::Text(_) => 3,
        }
    }
    match (left, right) {
        (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
        _ if rank(left) != rank(right) => rank(left).cmp(&rank(right)),
        _ => compare(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Apply a numeric binary operator after coercing both operands.
pub fn arithmetic(op: &str, left: &CellValue, right: &CellValue) -> Result<f64, QueryError> {
    let a = left.to_number()?;
    let b = right.to_number()?;
    Ok(match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        "%" => a % b,
        _ => return Err(QueryError::Unsupported(format!("operator {}", op))),
    })
}

fn describe(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "empty".to_string(),
        CellValue::Text(s) => format!("text '{}'", s),
        other => format!("{} {}", other.type_name(), other),
    }
}
