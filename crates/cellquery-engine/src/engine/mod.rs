//! Value model and query engine API.
//!
//! - [`CellValue`], [`RawGrid`] - raw host values and the grid shape
//! - [`ScalarValue`], [`GridValue`], [`TableValue`], [`Range`] - wrapped ranges
//! - [`RowView`], [`ColumnValue`] - row and column accessors
//! - [`CellSnapshot`], [`CellLocator`] - lazy cell escalation
//! - [`HostBridges`] - the host capability set
//! - [`wrap_argument`], [`normalize`] - the evaluation boundary
//! - [`create_engine`] - a Rhai engine with all of the above registered

pub mod bridge;
mod cell_ref;
mod columns;
mod escalation;
mod eval;
mod format;
mod normalize;
pub mod query;
mod range;
mod row;
mod snapshot;
mod value;
mod wrap;

pub use bridge::HostBridges;
pub use cell_ref::CellRef;
pub use columns::{ColumnMap, wrap_index};
pub use escalation::{CellLocator, CellResolver, Origin, RowLocator, resolve_cell};
pub use eval::{create_detached_engine, create_engine};
pub use format::{format_grid, format_number, format_value};
pub use normalize::{NormalizedGrid, cell_value_of, normalize, row_values_of, sequence_values_of};
pub use range::{GridValue, Range, RangeValue, ScalarValue, TableValue};
pub use row::{ColumnValue, RowView};
pub use snapshot::{CellSnapshot, Font, Interior};
pub use value::{CellValue, RawGrid, arithmetic, compare, compare_strict, sort_order, values_equal};
pub use wrap::wrap_argument;

pub use rhai::{AST, Dynamic};
