//! Application-level graph handle

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::client::Client;
use crate::config::Config;
use crate::element::{Edge, Elements, Vertex};
use crate::error::{Result, TrellisError};
use crate::index::{IndexKind, IndexProxy};
use crate::proxy::{EdgeProxy, ModelProxy, NodeProxy, RelationshipProxy, VertexProxy};
use crate::record::Response;
use crate::schema::Schema;
use crate::scripts::Scripts;
use crate::value::{BaseType, JsonMap};

/// Entry point bundling a client with its proxies
#[derive(Clone)]
pub struct Graph {
    client: Arc<dyn Client>,
    pub vertices: VertexProxy,
    pub edges: EdgeProxy,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("backend", &self.client.backend())
            .field("root", &self.client.config().root())
            .finish()
    }
}

impl Graph {
    /// Wrap a client, making sure the default indices exist
    pub fn new(client: Arc<dyn Client>) -> Result<Self> {
        let graph = Self {
            vertices: VertexProxy::new(Arc::clone(&client)),
            edges: EdgeProxy::new(Arc::clone(&client)),
            client,
        };

        let config = graph.client.config();
        if config.autoindex {
            graph
                .vertex_indices(IndexKind::Exact)
                .get_or_create(&config.vertex_index)?;
            graph
                .edge_indices(IndexKind::Exact)
                .get_or_create(&config.edge_index)?;
        }

        tracing::info!(
            "Connected to {} at {}",
            graph.client.backend(),
            graph.client.config().root()
        );
        Ok(graph)
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    pub fn config(&self) -> &Config {
        self.client.config()
    }

    /// Index lifecycle for vertex indices of one flavor
    pub fn vertex_indices(&self, kind: IndexKind) -> IndexProxy {
        IndexProxy::new(Arc::clone(&self.client), BaseType::Vertex, kind)
    }

    /// Index lifecycle for edge indices of one flavor
    pub fn edge_indices(&self, kind: IndexKind) -> IndexProxy {
        IndexProxy::new(Arc::clone(&self.client), BaseType::Edge, kind)
    }

    /// Register a schema under a proxy name
    pub fn add_proxy(&self, name: &str, schema: Arc<Schema>) {
        let mut registry = self.client.context().registry_mut();
        registry.add_proxy(name, &schema);
        registry.add_class(schema);
    }

    fn proxy_schema(&self, name: &str, base: BaseType) -> Result<Arc<Schema>> {
        let registry = self.client.registry();
        let entry = registry
            .get_proxy(name)
            .ok_or_else(|| TrellisError::NotFound(format!("proxy '{name}'")))?;
        if entry.base != base {
            return Err(TrellisError::WrongElementType {
                expected: base.to_string(),
                found: entry.base.to_string(),
            });
        }
        registry
            .get_class(&entry.element_type)
            .ok_or_else(|| TrellisError::NotFound(format!("class '{}'", entry.element_type)))
    }

    /// Typed proxy for a registered node schema
    pub fn node_proxy(&self, name: &str) -> Result<NodeProxy> {
        let schema = self.proxy_schema(name, BaseType::Vertex)?;
        ModelProxy::<Vertex>::new(Arc::clone(&self.client), schema)
    }

    /// Typed proxy for a registered relationship schema
    pub fn relationship_proxy(&self, name: &str) -> Result<RelationshipProxy> {
        let schema = self.proxy_schema(name, BaseType::Edge)?;
        ModelProxy::<Edge>::new(Arc::clone(&self.client), schema)
    }

    /// Load a script file into a namespace
    pub fn load_scripts(&self, namespace: &str, path: impl AsRef<Path>) -> Result<()> {
        let scripts = Scripts::from_file(namespace, path)?;
        tracing::debug!("Loaded {} scripts into '{}'", scripts.len(), namespace);
        self.client.context().registry_mut().add_scripts(scripts);
        Ok(())
    }

    /// Snapshot of a script namespace
    pub fn scripts(&self, namespace: &str) -> Option<Scripts> {
        self.client.registry().get_scripts(namespace).cloned()
    }

    /// Run a raw Gremlin script
    pub fn gremlin(&self, script: &str, params: &JsonMap) -> Result<Box<dyn Response>> {
        self.client.gremlin(script, params)
    }

    /// Run a Gremlin script whose results are elements
    pub fn query(&self, script: &str, params: &JsonMap) -> Result<Elements> {
        let response = self.client.gremlin(script, params)?;
        Ok(Elements::new(Arc::clone(&self.client), response.results()))
    }
}
