//! Per-client catalog of element classes, proxies, indices and scripts
//!
//! Populated while a graph is being set up and read afterward. The
//! registry holds descriptors only; handles bound to a client are built
//! from them on demand.

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::IndexRef;
use crate::schema::Schema;
use crate::scripts::Scripts;
use crate::value::BaseType;

/// A named proxy over one registered element class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub name: String,
    pub element_type: String,
    pub base: BaseType,
}

/// Catalog of element classes, proxies, indices and script namespaces
#[derive(Debug, Default)]
pub struct Registry {
    classes: HashMap<String, Arc<Schema>>,
    proxies: HashMap<String, ProxyEntry>,
    indices: HashMap<String, IndexRef>,
    scripts: HashMap<String, Scripts>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its element type
    ///
    /// The built-in `vertex` and `edge` types are never registered; they
    /// are the fallback for every unknown key.
    pub fn add_class(&mut self, schema: Arc<Schema>) {
        let key = schema.element_type();
        if BaseType::parse(key).is_some() {
            return;
        }
        self.classes.insert(key.to_string(), schema);
    }

    /// Class registered for `element_type`, `None` if unknown
    pub fn get_class(&self, element_type: &str) -> Option<Arc<Schema>> {
        self.classes.get(element_type).cloned()
    }

    pub fn has_class(&self, element_type: &str) -> bool {
        self.classes.contains_key(element_type)
    }

    pub fn add_proxy(&mut self, name: impl Into<String>, schema: &Schema) {
        let name = name.into();
        self.proxies.insert(
            name.clone(),
            ProxyEntry {
                name,
                element_type: schema.element_type().to_string(),
                base: schema.base(),
            },
        );
    }

    pub fn get_proxy(&self, name: &str) -> Option<&ProxyEntry> {
        self.proxies.get(name)
    }

    pub fn add_index(&mut self, index: IndexRef) {
        self.indices.insert(index.name.clone(), index);
    }

    pub fn get_index(&self, name: &str) -> Option<&IndexRef> {
        self.indices.get(name)
    }

    pub fn remove_index(&mut self, name: &str) -> Option<IndexRef> {
        self.indices.remove(name)
    }

    /// Add scripts, merging into an existing namespace
    pub fn add_scripts(&mut self, scripts: Scripts) {
        match self.scripts.get_mut(scripts.namespace()) {
            Some(existing) => {
                for name in scripts.names() {
                    if let Ok(method) = scripts.method(name) {
                        existing.insert(method.clone());
                    }
                }
            }
            None => {
                self.scripts.insert(scripts.namespace().to_string(), scripts);
            }
        }
    }

    pub fn get_scripts(&self, namespace: &str) -> Option<&Scripts> {
        self.scripts.get(namespace)
    }
}
