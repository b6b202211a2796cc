//! The backend client contract
//!
//! A [`Client`] is the single entry point for backend calls. Each backend
//! crate implements it over its own wire protocol and returns canonical
//! [`Response`]s, so the model and index layers are backend-agnostic.

use serde_json::Value as JsonValue;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::error::Result;
use crate::index::{IndexKind, IndexRef};
use crate::record::Response;
use crate::registry::Registry;
use crate::scripts::Scripts;
use crate::typesystem::{JsonTypeSystem, TypeSystem};
use crate::value::{BaseType, Direction, ElementId, JsonMap};

/// State every client owns: config, type system and registry
pub struct ClientContext {
    config: Arc<Config>,
    type_system: Box<dyn TypeSystem>,
    registry: RwLock<Registry>,
}

impl ClientContext {
    pub fn new(config: Config) -> Self {
        Self::with_type_system(config, Box::new(JsonTypeSystem::new()))
    }

    pub fn with_type_system(config: Config, type_system: Box<dyn TypeSystem>) -> Self {
        Self {
            config: Arc::new(config),
            type_system,
            registry: RwLock::new(Registry::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn type_system(&self) -> &dyn TypeSystem {
        self.type_system.as_ref()
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registry for setup-time mutation
    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Index to maintain alongside an element write
#[derive(Debug, Clone, Copy)]
pub struct IndexWrite<'a> {
    pub name: &'a str,
    /// Keys to index; `None` means every property
    pub keys: Option<&'a [String]>,
}

impl<'a> IndexWrite<'a> {
    pub fn new(name: &'a str, keys: Option<&'a [String]>) -> Self {
        Self { name, keys }
    }
}

/// Backend calls used by the element, model and index layers
pub trait Client: Send + Sync {
    fn context(&self) -> &ClientContext;

    /// Backend name for logging
    fn backend(&self) -> &str;

    fn config(&self) -> &Config {
        self.context().config()
    }

    fn type_system(&self) -> &dyn TypeSystem {
        self.context().type_system()
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.context().registry()
    }

    // Vertices

    fn create_vertex(
        &self,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>>;

    fn get_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>>;

    /// Replace a vertex's properties; responds with the updated vertex
    fn update_vertex(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>>;

    fn delete_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>>;

    // Edges

    fn create_edge(
        &self,
        out_v: &ElementId,
        label: &str,
        in_v: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>>;

    fn get_edge(&self, id: &ElementId) -> Result<Box<dyn Response>>;

    /// Replace an edge's properties; responds with the updated edge
    fn update_edge(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>>;

    fn delete_edge(&self, id: &ElementId) -> Result<Box<dyn Response>>;

    // Traversal

    /// Edges incident to a vertex, optionally filtered by label
    fn vertex_edges(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>>;

    /// Vertices adjacent to a vertex, optionally filtered by edge label
    fn adjacent_vertices(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>>;

    // Indices

    fn create_index(&self, index: &IndexRef) -> Result<Box<dyn Response>>;

    fn get_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>>;

    fn delete_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>>;

    fn put_index_entry(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
        id: &ElementId,
    ) -> Result<Box<dyn Response>>;

    fn lookup_index(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
    ) -> Result<Box<dyn Response>>;

    /// Remove the entries for `id`; narrowed to `key` (and `value`) when given
    fn remove_index_entry(
        &self,
        index: &IndexRef,
        id: &ElementId,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<Box<dyn Response>>;

    fn count_index(&self, index: &IndexRef, key: &str, value: &JsonValue) -> Result<u64>;

    // Scripts

    fn gremlin(&self, script: &str, params: &JsonMap) -> Result<Box<dyn Response>>;

    /// Run a registered server-side method by namespace and name
    fn run_script(
        &self,
        namespace: &str,
        method: &str,
        params: &JsonMap,
    ) -> Result<Box<dyn Response>> {
        let script = {
            let registry = self.registry();
            let scripts = registry.get_scripts(namespace).ok_or_else(|| {
                crate::error::TrellisError::NotFound(format!("script namespace '{namespace}'"))
            })?;
            scripts.get(method)?.to_string()
        };
        self.gremlin(&script, params)
    }
}

/// Register a backend's bundled scripts
pub fn register_scripts(context: &ClientContext, namespace: &str, source: &str) -> Result<()> {
    let scripts = Scripts::parse(namespace, source)?;
    context.registry_mut().add_scripts(scripts);
    Ok(())
}

/// Descriptor for an index named in an element write
///
/// Indices known to the registry keep their registered kind; others are
/// treated as exact indices.
pub fn index_for_write(client: &dyn Client, base: BaseType, name: &str) -> IndexRef {
    client
        .registry()
        .get_index(name)
        .filter(|index| index.base == base)
        .cloned()
        .unwrap_or_else(|| IndexRef::new(base, name, IndexKind::Exact))
}

/// Remove every element stored under the pair; returns how many were held
pub fn remove_index_holders(
    client: &dyn Client,
    index: &IndexRef,
    key: &str,
    value: &JsonValue,
) -> Result<usize> {
    let ids: Vec<ElementId> = match client.lookup_index(index, key, value) {
        Ok(response) => response.results().into_iter().filter_map(|r| r.id()).collect(),
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };
    for id in &ids {
        client.remove_index_entry(index, id, Some(key), Some(value))?;
    }
    Ok(ids.len())
}

/// Write index entries for an element that was just created or updated
///
/// With `replace`, the element's existing entry for each key is removed
/// first. On a unique index every other holder of the pair is removed
/// before the put, so the pair keeps a single element. `previous` holds
/// the element's data before the write for backends that can only remove
/// an entry by its exact value; without it entries are removed by key
/// alone.
///
/// Runs after the element write and is not atomic with it: when an entry
/// fails, the element stays unindexed and the error is returned.
pub fn write_index_entries(
    client: &dyn Client,
    index: &IndexRef,
    id: &ElementId,
    data: &JsonMap,
    keys: Option<&[String]>,
    replace: bool,
    previous: Option<&JsonMap>,
) -> Result<()> {
    if index.kind == IndexKind::Automatic {
        return Ok(());
    }

    let selected: Vec<(&String, &JsonValue)> = match keys {
        Some(keys) => keys
            .iter()
            .filter_map(|key| data.get_key_value(key.as_str()))
            .collect(),
        None => data.iter().collect(),
    };

    for (key, value) in selected {
        if value.is_null() {
            continue;
        }
        if replace {
            let stale = match previous {
                Some(previous) => previous.get(key.as_str()).filter(|v| !v.is_null()).map(Some),
                None => Some(None),
            };
            if let Some(stale) = stale {
                if let Err(err) = client.remove_index_entry(index, id, Some(key), stale) {
                    if !err.is_not_found() {
                        return Err(err);
                    }
                }
            }
        }
        if index.kind == IndexKind::Unique {
            let removed = remove_index_holders(client, index, key, value)?;
            tracing::debug!(
                "Replaced {} entries for {}={} in '{}'",
                removed,
                key,
                value,
                index.name
            );
        }
        if let Err(err) = client.put_index_entry(index, key, value, id) {
            tracing::warn!(
                "{} {} {} written but not indexed under '{}' in '{}': {}",
                client.backend(),
                index.base,
                id,
                key,
                index.name,
                err
            );
            return Err(err);
        }
    }
    Ok(())
}
