//! Explicit per-type schemas
//!
//! A [`Schema`] records the declared properties of one domain type along
//! with the element type key it is stored under. Schemas are built once
//! during setup and shared behind `Arc`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, TrellisError};
use crate::property::Property;
use crate::value::BaseType;

/// Declared fields of a vertex or edge type
#[derive(Debug, Clone)]
pub struct Schema {
    element_type: String,
    base: BaseType,
    properties: Vec<Property>,
    index_name: Option<String>,
    index_keys: Option<Vec<String>>,
}

impl Schema {
    /// Start a schema for vertices stored with `element_type`
    pub fn vertex(element_type: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(BaseType::Vertex, element_type)
    }

    /// Start a schema for edges with the given label
    pub fn edge(label: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(BaseType::Edge, label)
    }

    /// Type key for vertices, label for edges
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn base(&self) -> BaseType {
        self.base
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Stored (non-calculated) properties
    pub fn stored(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.is_calculated())
    }

    /// Index to write on create/update, `None` when autoindexing is off
    pub fn index_name<'a>(&'a self, config: &'a Config) -> Option<&'a str> {
        if !config.autoindex {
            return None;
        }
        Some(self.index_name.as_deref().unwrap_or(match self.base {
            BaseType::Vertex => config.vertex_index.as_str(),
            BaseType::Edge => config.edge_index.as_str(),
        }))
    }

    /// Keys to index; `None` means every property
    pub fn index_keys(&self) -> Option<Vec<String>> {
        if let Some(keys) = &self.index_keys {
            return Some(keys.clone());
        }
        let indexed: Vec<String> = self
            .stored()
            .filter(|p| p.is_indexed())
            .map(|p| p.name().to_string())
            .collect();
        if indexed.is_empty() {
            None
        } else {
            Some(indexed)
        }
    }
}

/// Builder that rejects duplicate property names across the chain
#[derive(Debug)]
pub struct SchemaBuilder {
    element_type: String,
    base: BaseType,
    properties: Vec<Property>,
    index_name: Option<String>,
    index_keys: Option<Vec<String>>,
    errors: Vec<String>,
}

impl SchemaBuilder {
    fn new(base: BaseType, element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            base,
            properties: Vec::new(),
            index_name: None,
            index_keys: None,
            errors: Vec::new(),
        }
    }

    /// Inherit every property of `parent`
    pub fn extends(mut self, parent: &Schema) -> Self {
        if parent.base != self.base {
            self.errors.push(format!(
                "{} schema '{}' cannot extend {} schema '{}'",
                self.base, self.element_type, parent.base, parent.element_type
            ));
            return self;
        }
        for prop in &parent.properties {
            self = self.property(prop.clone());
        }
        if self.index_name.is_none() {
            self.index_name = parent.index_name.clone();
        }
        self
    }

    /// Declare a property
    pub fn property(mut self, property: Property) -> Self {
        if self.properties.iter().any(|p| p.name() == property.name()) {
            self.errors.push(format!(
                "property '{}' is already defined on '{}'",
                property.name(),
                self.element_type
            ));
        } else {
            self.properties.push(property);
        }
        self
    }

    /// Write to a specific index instead of the configured default
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Index only these keys
    pub fn index_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Schema> {
        if self.element_type.is_empty() {
            return Err(TrellisError::Schema("element type must not be empty".to_string()));
        }
        if let Some(first) = self.errors.into_iter().next() {
            return Err(TrellisError::Schema(first));
        }
        if let Some(keys) = &self.index_keys {
            let declared: HashSet<&str> = self.properties.iter().map(|p| p.name()).collect();
            if let Some(missing) = keys.iter().find(|k| !declared.contains(k.as_str())) {
                return Err(TrellisError::Schema(format!(
                    "index key '{missing}' is not a declared property of '{}'",
                    self.element_type
                )));
            }
        }
        Ok(Schema {
            element_type: self.element_type,
            base: self.base,
            properties: self.properties,
            index_name: self.index_name,
            index_keys: self.index_keys,
        })
    }

    /// Build and wrap for sharing
    pub fn build_shared(self) -> Result<Arc<Schema>> {
        self.build().map(Arc::new)
    }
}
