//! Errors raised by the value model and query engine.
//!
//! Inside Rhai these travel as runtime errors carrying the [`QueryError`]
//! itself, so the caller of an evaluation can recover the category.

use rhai::{Dynamic, EvalAltResult, Position};
use thiserror::Error;

/// Broad category of a [`QueryError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryErrorKind {
    UnknownColumn,
    CellAccessUnavailable,
    Evaluation,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("column not found: '{key}' (available: {})", .available.join(", "))]
    UnknownColumn { key: String, available: Vec<String> },

    #[error("column index {index} out of range for a row of width {width}")]
    ColumnOutOfRange { index: i64, width: usize },

    #[error("row index {index} out of range for a range of {len} rows")]
    RowOutOfRange { index: i64, len: usize },

    #[error("cell access unavailable: {0}")]
    CellAccessUnavailable(String),

    #[error("cell resolution failed: {0}")]
    Resolver(String),

    #[error("host bridge failed: {0}")]
    Bridge(String),

    #[error("cannot convert {found} to {expected}")]
    Coercion {
        expected: &'static str,
        found: String,
    },

    #[error("cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },

    #[error("{0} of an empty range")]
    EmptyAggregation(&'static str),

    #[error("no row matches")]
    NoMatch,

    #[error("a row with {0} columns cannot be used as a single value")]
    NotSingleColumn(usize),

    #[error("unsupported value of type {0}")]
    Unsupported(String),
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::UnknownColumn { .. } => QueryErrorKind::UnknownColumn,
            QueryError::CellAccessUnavailable(_) => QueryErrorKind::CellAccessUnavailable,
            _ => QueryErrorKind::Evaluation,
        }
    }

    pub(crate) fn coercion(expected: &'static str, found: impl std::fmt::Display) -> Self {
        QueryError::Coercion {
            expected,
            found: found.to_string(),
        }
    }

    /// Recover a `QueryError` carried by a Rhai error, looking through
    /// nested function-call frames.
    pub fn from_rhai(err: &EvalAltResult) -> Option<QueryError> {
        match err {
            EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<QueryError>(),
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => Self::from_rhai(inner),
            EvalAltResult::ErrorInModule(_, inner, _) => Self::from_rhai(inner),
            _ => None,
        }
    }
}

impl From<QueryError> for Box<EvalAltResult> {
    fn from(err: QueryError) -> Self {
        EvalAltResult::ErrorRuntime(Dynamic::from(err), Position::NONE).into()
    }
}
