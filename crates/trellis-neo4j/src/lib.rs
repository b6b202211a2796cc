//! Trellis Neo4j - Neo4j Server REST backend
//!
//! Speaks the Neo4j Server REST API (`/db/data`) with the Gremlin plugin
//! for scripts.

pub mod client;
pub mod record;

pub use client::{Neo4jClient, SCRIPT_NAMESPACE};
pub use record::{Neo4jRecord, Neo4jResponse, NODE_AUTO_INDEX, RELATIONSHIP_AUTO_INDEX};

use std::sync::Arc;
use trellis_core::{Config, Graph, Result};

/// Connect to a Neo4j server and prepare a graph handle
pub fn connect(config: Config) -> Result<Graph> {
    Graph::new(Arc::new(Neo4jClient::new(config)?))
}

/// Connect to a local server on the default port
pub fn connect_default() -> Result<Graph> {
    connect(Config::new(trellis_core::config::NEO4J_URI))
}
