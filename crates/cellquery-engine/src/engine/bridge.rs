//! Host capabilities exposed to an evaluation.
//!
//! The engine never sees host objects directly. It receives opaque
//! [`Dynamic`] handles and a set of read-only callables that turn them into
//! raw values, headers and anchors.

use std::fmt;
use std::sync::Arc;

use rhai::Dynamic;

use super::escalation::{CellResolver, Origin};
use super::snapshot::CellSnapshot;
use super::value::RawGrid;

pub type HandleCheck = Arc<dyn Fn(&Dynamic) -> bool + Send + Sync>;
pub type RawValues = Arc<dyn Fn(&Dynamic) -> Result<RawGrid, String> + Send + Sync>;
pub type HeaderLookup = Arc<dyn Fn(&Dynamic) -> Option<Vec<String>> + Send + Sync>;
pub type OriginLookup = Arc<dyn Fn(&Dynamic) -> Option<(String, usize, usize)> + Send + Sync>;

/// The bridge set handed to the engine.
#[derive(Clone)]
pub struct HostBridges {
    is_handle: HandleCheck,
    raw_values: RawValues,
    headers: Option<HeaderLookup>,
    origin: Option<OriginLookup>,
    resolver: Option<CellResolver>,
}

impl HostBridges {
    pub fn new<C, V>(is_handle: C, raw_values: V) -> HostBridges
    where
        C: Fn(&Dynamic) -> bool + Send + Sync + 'static,
        V: Fn(&Dynamic) -> Result<RawGrid, String> + Send + Sync + 'static,
    {
        HostBridges {
            is_handle: Arc::new(is_handle),
            raw_values: Arc::new(raw_values),
            headers: None,
            origin: None,
            resolver: None,
        }
    }

    /// Bridges for a host with no handles: every argument is materialized data.
    pub fn detached() -> HostBridges {
        HostBridges::new(|_| false, |_| Err("no host handles available".to_string()))
    }

    pub fn with_headers<F>(mut self, headers: F) -> HostBridges
    where
        F: Fn(&Dynamic) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        self.headers = Some(Arc::new(headers));
        self
    }

    pub fn with_origin<F>(mut self, origin: F) -> HostBridges
    where
        F: Fn(&Dynamic) -> Option<(String, usize, usize)> + Send + Sync + 'static,
    {
        self.origin = Some(Arc::new(origin));
        self
    }

    pub fn with_cell_resolver<F>(mut self, resolver: F) -> HostBridges
    where
        F: Fn(&str, usize, usize) -> Result<CellSnapshot, String> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn is_handle(&self, value: &Dynamic) -> bool {
        (self.is_handle)(value)
    }

    pub fn raw_values(&self, handle: &Dynamic) -> Result<RawGrid, String> {
        (self.raw_values)(handle)
    }

    pub fn headers(&self, handle: &Dynamic) -> Option<Vec<String>> {
        self.headers.as_ref().and_then(|f| f(handle))
    }

    pub fn origin(&self, handle: &Dynamic) -> Option<Origin> {
        let (sheet, top, left) = self.origin.as_ref().and_then(|f| f(handle))?;
        Some(Origin::new(sheet, top, left))
    }

    pub fn resolver(&self) -> Option<CellResolver> {
        self.resolver.clone()
    }
}

impl fmt::Debug for HostBridges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBridges")
            .field("headers", &self.headers.is_some())
            .field("origin", &self.origin.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
