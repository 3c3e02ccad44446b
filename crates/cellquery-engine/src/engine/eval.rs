//! Rhai engine creation.
//!
//! Every evaluation gets an engine with the value model registered and the
//! host bridges as its only channel back to host data.

use rhai::Engine;

use super::bridge::HostBridges;

/// Create a Rhai engine with the value model and bridge helpers registered.
pub fn create_engine(bridges: HostBridges) -> Engine {
    let mut engine = Engine::new();
    crate::builtins::register_builtins(&mut engine, bridges);
    engine
}

/// Create an engine for materialized data only.
pub fn create_detached_engine() -> Engine {
    create_engine(HostBridges::detached())
}
