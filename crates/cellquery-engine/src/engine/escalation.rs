//! Lazy cell escalation.
//!
//! A wrapped range that still maps 1:1 onto host positions carries an
//! [`Origin`]. Rows and columns derived from it hold explicit locator
//! handles; the host resolver is only called when user code asks for a
//! cell snapshot.

use std::fmt;
use std::sync::Arc;

use super::snapshot::CellSnapshot;
use crate::error::QueryError;

/// Host cell-resolution bridge: `(sheet, row, col)` with 1-based positions.
pub type CellResolver = Arc<dyn Fn(&str, usize, usize) -> Result<CellSnapshot, String> + Send + Sync>;

/// Absolute anchor of a buffer's top-left element (1-based).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    pub sheet: String,
    pub top: usize,
    pub left: usize,
}

impl Origin {
    pub fn new(sheet: impl Into<String>, top: usize, left: usize) -> Origin {
        Origin {
            sheet: sheet.into(),
            top,
            left,
        }
    }

    /// Host position of buffer element `(row, col)`.
    pub fn position(&self, row: usize, col: usize) -> (usize, usize) {
        (self.top + row, self.left + col)
    }
}

/// What a range knows about escalation at wrap time.
#[derive(Clone)]
pub(crate) struct Anchor {
    pub origin: Origin,
    pub resolver: Option<CellResolver>,
}

impl Anchor {
    pub fn row(&self, row: usize) -> RowLocator {
        RowLocator {
            sheet: Arc::from(self.origin.sheet.as_str()),
            row: self.origin.top + row,
            left: self.origin.left,
            resolver: self.resolver.clone(),
        }
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("origin", &self.origin)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Locates the cells of one row.
#[derive(Clone)]
pub struct RowLocator {
    sheet: Arc<str>,
    row: usize,
    left: usize,
    resolver: Option<CellResolver>,
}

impl RowLocator {
    pub fn column(&self, col: usize) -> CellLocator {
        CellLocator {
            sheet: self.sheet.clone(),
            row: self.row,
            col: self.left + col,
            resolver: self.resolver.clone(),
        }
    }
}

impl fmt::Debug for RowLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowLocator({}!{})", self.sheet, self.row)
    }
}

/// Locates one host cell and resolves it on demand.
#[derive(Clone)]
pub struct CellLocator {
    sheet: Arc<str>,
    row: usize,
    col: usize,
    resolver: Option<CellResolver>,
}

impl CellLocator {
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn resolve(&self) -> Result<CellSnapshot, QueryError> {
        let Some(resolver) = self.resolver.as_ref() else {
            return Err(QueryError::CellAccessUnavailable(
                "no cell resolution bridge is registered".to_string(),
            ));
        };
        tracing::trace!(sheet = %self.sheet, row = self.row, col = self.col, "resolving cell");
        resolver(&self.sheet, self.row, self.col).map_err(QueryError::Resolver)
    }
}

impl fmt::Debug for CellLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellLocator({}!R{}C{})", self.sheet, self.row, self.col)
    }
}

/// Resolve through an optional locator, failing when the value carries none.
pub fn resolve_cell(locator: Option<&CellLocator>) -> Result<CellSnapshot, QueryError> {
    match locator {
        Some(locator) => locator.resolve(),
        None => Err(QueryError::CellAccessUnavailable(
            "value has no origin (derived ranges and materialized data cannot escalate)"
                .to_string(),
        )),
    }
}
