//! Typed value model and query engine for cell expressions.
//!
//! Host data is wrapped into scalars, grids or tables that share one range
//! contract; user expressions run against them in a Rhai engine whose only
//! link back to the host is a [`HostBridges`](engine::HostBridges) set.

pub mod builtins;
pub mod engine;
pub mod error;

pub use error::{QueryError, QueryErrorKind};
