//! Trellis Rexster - Rexster and Titan REST backends
//!
//! Both servers speak the Rexster encoding with explicit `_id`/`_type`
//! fields. Titan graphs only offer key indices; see [`titan`].

pub mod client;
pub mod record;
pub mod titan;

pub use client::{typed_value, Flavor, RexsterClient, SCRIPT_NAMESPACE};
pub use record::{RexsterRecord, RexsterResponse};

use std::sync::Arc;
use trellis_core::config::{REXSTER_URI, TITAN_URI};
use trellis_core::{Config, Graph, Result};

/// Connect to a Rexster graph and prepare a graph handle
pub fn connect(config: Config) -> Result<Graph> {
    Graph::new(Arc::new(RexsterClient::new(config)?))
}

/// Connect to a Titan graph and prepare a graph handle
pub fn connect_titan(config: Config) -> Result<Graph> {
    Graph::new(Arc::new(RexsterClient::titan(config)?))
}

/// Connect to the local `emptygraph` on the default port
pub fn connect_default() -> Result<Graph> {
    connect(Config::new(REXSTER_URI))
}

/// Connect to a local Titan graph on the default port
pub fn connect_titan_default() -> Result<Graph> {
    connect_titan(Config::new(TITAN_URI))
}
