//! Error types for cellquery core.

use std::fmt;

use cellquery_engine::{QueryError, QueryErrorKind};
use rhai::EvalAltResult;
use thiserror::Error;

use crate::analysis::AnalysisError;

/// Category reported to the host for every failed evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    UnknownColumn,
    CellAccessUnavailable,
    ExpressionAnalysis,
    Evaluation,
    /// Loading inputs or configuration failed before any evaluation ran.
    Host,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::UnknownColumn => "unknown-column",
            FailureKind::CellAccessUnavailable => "cell-access-unavailable",
            FailureKind::ExpressionAnalysis => "expression-analysis",
            FailureKind::Evaluation => "evaluation",
            FailureKind::Host => "host",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("expression does not compile: {0}")]
    Compile(String),

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },

    #[error("no value bound for '{0}'")]
    MissingArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Analysis(_) | Error::Compile(_) => FailureKind::ExpressionAnalysis,
            Error::Query(err) => match err.kind() {
                QueryErrorKind::UnknownColumn => FailureKind::UnknownColumn,
                QueryErrorKind::CellAccessUnavailable => FailureKind::CellAccessUnavailable,
                QueryErrorKind::Evaluation => FailureKind::Evaluation,
            },
            Error::Evaluation(_) | Error::Arity { .. } | Error::MissingArgument(_) => {
                FailureKind::Evaluation
            }
            Error::Io(_) | Error::Parse { .. } | Error::Config(_) => FailureKind::Host,
        }
    }
}

impl From<Box<EvalAltResult>> for Error {
    fn from(err: Box<EvalAltResult>) -> Self {
        match QueryError::from_rhai(&err) {
            Some(query) => Error::Query(query),
            None => Error::Evaluation(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{Dynamic, Position};

    #[test]
    fn carried_query_errors_keep_their_category() {
        let boxed: Box<EvalAltResult> = QueryError::CellAccessUnavailable("x".into()).into();
        let err = Error::from(boxed);
        assert_eq!(err.kind(), FailureKind::CellAccessUnavailable);
    }

    #[test]
    fn plain_rhai_errors_are_evaluation_failures() {
        let boxed: Box<EvalAltResult> =
            EvalAltResult::ErrorRuntime(Dynamic::from("boom".to_string()), Position::NONE).into();
        let err = Error::from(boxed);
        assert_eq!(err.kind(), FailureKind::Evaluation);
        assert!(err.to_string().contains("boom"));
    }
}
