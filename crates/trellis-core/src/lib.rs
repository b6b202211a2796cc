//! Trellis Core - Typed object model over graph database backends
//!
//! This crate holds everything that does not depend on a backend's wire
//! encoding:
//! - Property descriptors, schemas and the host/wire type system
//! - The canonical `Record`/`Response` contract backends implement
//! - The per-client registry of classes, proxies, indices and scripts
//! - Element materialization and the schema-carrying model layer
//! - Index proxies and index containers
//! - Configuration, transport and the shared error type

pub mod client;
pub mod config;
pub mod element;
pub mod error;
pub mod graph;
pub mod index;
pub mod model;
pub mod property;
pub mod proxy;
pub mod record;
pub mod registry;
pub mod schema;
pub mod scripts;
pub mod transport;
pub mod typesystem;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Client, ClientContext, IndexWrite};
pub use config::{Config, ConfigError};
pub use element::{initialize_element, Edge, Element, ElementCore, Elements, GraphElement, Vertex};
pub use error::{Result, TrellisError, ValidationError};
pub use graph::Graph;
pub use index::{Index, IndexEntry, IndexKind, IndexProxy, IndexRef};
pub use model::{Model, Node, Relationship};
pub use property::{Property, PropertyKind};
pub use proxy::{EdgeProxy, ModelProxy, NodeProxy, RelationshipProxy, VertexProxy};
pub use record::{handle_response, Record, Records, Response, Results};
pub use registry::Registry;
pub use schema::{Schema, SchemaBuilder};
pub use scripts::{Script, Scripts};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
pub use typesystem::{DatabaseConverter, HostConverter, JsonTypeSystem, TypeSystem};
pub use value::{BaseType, Direction, ElementId, JsonMap, PropertyMap, Value};
