//! cellquery-core - expression analysis, evaluation units and an in-memory
//! host to run them against.

pub mod analysis;
pub mod config;
pub mod error;
pub mod storage;
pub mod unit;
pub mod workbook;

pub use analysis::{Analysis, Analyzer, AnalysisError, BodyKind, Shape, analyze, analyze_in_scope};
pub use config::Config;
pub use error::{Error, FailureKind, Result};
pub use unit::{EmitOptions, EmittedUnit, EvaluationUnit, ReservedNames, emit};
pub use workbook::{CellFormat, RangeHandle, Sheet, Workbook};

pub use cellquery_engine::engine::{CellRef, CellValue, RawGrid};
