//! Index proxies and index containers
//!
//! An [`Index`] maps `(key, value)` pairs to element ids in one of three
//! flavors:
//! - `Exact`: any number of elements per pair, maintained by the caller
//! - `Unique`: at most one element per pair, maintained by the caller
//! - `Automatic`: maintained by the backend, read-only to the client
//!
//! Unique writes remove every existing entry for the pair and then put the
//! new one. The two steps are separate requests, so a concurrent reader
//! can observe the pair empty or doubled; under contention the last
//! writer wins.

use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use crate::client::{remove_index_holders, Client};
use crate::element::{initialize_element, Element, Elements};
use crate::error::{Result, TrellisError};
use crate::value::{BaseType, ElementId, PropertyMap, Value};

/// Consistency flavor of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Exact,
    Unique,
    Automatic,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Unique => "unique",
            Self::Automatic => "automatic",
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Automatic)
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, element class and flavor of an index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRef {
    pub base: BaseType,
    pub name: String,
    pub kind: IndexKind,
}

impl IndexRef {
    pub fn new(base: BaseType, name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            base,
            name: name.into(),
            kind,
        }
    }
}

/// A normalized `(key, value)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: String,
    pub value: Value,
}

impl IndexEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Normalize a single keyword pair such as `{"name": "James"}`
    pub fn from_keywords(pair: PropertyMap) -> Result<Self> {
        if pair.len() != 1 {
            return Err(TrellisError::InvalidInput(format!(
                "expected exactly one key/value pair, got {}",
                pair.len()
            )));
        }
        pair.into_iter()
            .next()
            .map(|(key, value)| Self { key, value })
            .ok_or_else(|| TrellisError::InvalidInput("empty key/value pair".to_string()))
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for IndexEntry {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Handle to one backend index
#[derive(Clone)]
pub struct Index {
    client: Arc<dyn Client>,
    info: IndexRef,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index").field("info", &self.info).finish()
    }
}

impl Index {
    pub fn new(client: Arc<dyn Client>, info: IndexRef) -> Self {
        Self { client, info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> IndexKind {
        self.info.kind
    }

    pub fn base(&self) -> BaseType {
        self.info.base
    }

    pub fn info(&self) -> &IndexRef {
        &self.info
    }

    fn ensure_writable(&self, op: &str) -> Result<()> {
        if self.info.kind.is_writable() {
            Ok(())
        } else {
            Err(TrellisError::ReadOnly(format!(
                "cannot {op} on automatic index '{}'",
                self.info.name
            )))
        }
    }

    fn wire_value(&self, value: &Value) -> Result<JsonValue> {
        self.client.type_system().database().to_db(value)
    }

    /// Add an entry; on a unique index this replaces existing entries
    pub fn put(&self, id: &ElementId, entry: impl Into<IndexEntry>) -> Result<()> {
        self.ensure_writable("put")?;
        let entry = entry.into();
        if self.info.kind == IndexKind::Unique {
            return self.replace(id, &entry);
        }
        let value = self.wire_value(&entry.value)?;
        self.client
            .put_index_entry(&self.info, &entry.key, &value, id)?;
        Ok(())
    }

    /// Make `id` the only element under the pair
    pub fn update(&self, id: &ElementId, entry: impl Into<IndexEntry>) -> Result<()> {
        self.ensure_writable("update")?;
        self.replace(id, &entry.into())
    }

    /// Alias of [`Index::update`]
    pub fn put_unique(&self, id: &ElementId, entry: impl Into<IndexEntry>) -> Result<()> {
        self.update(id, entry)
    }

    fn replace(&self, id: &ElementId, entry: &IndexEntry) -> Result<()> {
        let value = self.wire_value(&entry.value)?;
        let removed = self.remove_all(&entry.key, &value)?;
        tracing::debug!(
            "Replaced {} entries for {}={} in '{}'",
            removed,
            entry.key,
            entry.value,
            self.info.name
        );
        self.client
            .put_index_entry(&self.info, &entry.key, &value, id)?;
        Ok(())
    }

    fn remove_all(&self, key: &str, value: &JsonValue) -> Result<usize> {
        remove_index_holders(self.client.as_ref(), &self.info, key, value)
    }

    /// Elements stored under the pair, materialized lazily
    pub fn lookup(&self, entry: impl Into<IndexEntry>) -> Result<Elements> {
        let entry = entry.into();
        let value = self.wire_value(&entry.value)?;
        match self.client.lookup_index(&self.info, &entry.key, &value) {
            Ok(response) => Ok(Elements::new(Arc::clone(&self.client), response.results())),
            Err(err) if err.is_not_found() => Ok(Elements::empty(Arc::clone(&self.client))),
            Err(err) => Err(err),
        }
    }

    /// The single element under the pair
    ///
    /// `None` when absent, [`TrellisError::Multiplicity`] when several
    /// elements share the pair.
    pub fn get_unique(&self, entry: impl Into<IndexEntry>) -> Result<Option<Element>> {
        let entry = entry.into();
        let value = self.wire_value(&entry.value)?;
        let response = match self.client.lookup_index(&self.info, &entry.key, &value) {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        match response.one()? {
            Some(record) => initialize_element(&self.client, record.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    /// Remove the entry for `id` under the pair
    pub fn remove(&self, id: &ElementId, entry: impl Into<IndexEntry>) -> Result<()> {
        self.ensure_writable("remove")?;
        let entry = entry.into();
        let value = self.wire_value(&entry.value)?;
        self.client
            .remove_index_entry(&self.info, id, Some(&entry.key), Some(&value))?;
        Ok(())
    }

    /// Number of elements under the pair
    pub fn count(&self, entry: impl Into<IndexEntry>) -> Result<u64> {
        let entry = entry.into();
        let value = self.wire_value(&entry.value)?;
        match self.client.count_index(&self.info, &entry.key, &value) {
            Err(err) if err.is_not_found() => Ok(0),
            other => other,
        }
    }
}

/// Lifecycle of indices of one element class and flavor
#[derive(Clone)]
pub struct IndexProxy {
    client: Arc<dyn Client>,
    base: BaseType,
    kind: IndexKind,
}

impl fmt::Debug for IndexProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexProxy")
            .field("base", &self.base)
            .field("kind", &self.kind)
            .finish()
    }
}

impl IndexProxy {
    pub fn new(client: Arc<dyn Client>, base: BaseType, kind: IndexKind) -> Self {
        Self { client, base, kind }
    }

    /// Create the index on the backend
    pub fn create(&self, name: &str) -> Result<Index> {
        let info = IndexRef::new(self.base, name, self.kind);
        let response = self.client.create_index(&info)?;
        let info = match response.one()? {
            Some(record) => self.resolve(name, record.as_ref())?,
            None => info,
        };
        tracing::info!(
            "Created {} {} index '{}' on {}",
            info.kind,
            info.base,
            info.name,
            self.client.backend()
        );
        Ok(self.register(info))
    }

    /// Fetch an existing index; `NotFound` if it does not exist
    pub fn get(&self, name: &str) -> Result<Index> {
        let response = self.client.get_index(self.base, name)?;
        let record = response
            .one()?
            .ok_or_else(|| TrellisError::NotFound(format!("{} index '{name}'", self.base)))?;
        let info = self.resolve(name, record.as_ref())?;
        Ok(self.register(info))
    }

    /// Fetch the index, creating it when missing
    pub fn get_or_create(&self, name: &str) -> Result<Index> {
        match self.get(name) {
            Ok(index) => Ok(index),
            Err(err) if err.is_not_found() => match self.create(name) {
                Ok(index) => Ok(index),
                // Lost a race with another creator
                Err(create_err) => self.get(name).map_err(|_| create_err),
            },
            Err(err) => Err(err),
        }
    }

    /// Drop the index from the backend and the registry
    pub fn delete(&self, name: &str) -> Result<()> {
        self.client.delete_index(self.base, name)?;
        self.client.context().registry_mut().remove_index(name);
        tracing::info!("Deleted {} index '{}'", self.base, name);
        Ok(())
    }

    fn resolve(&self, name: &str, record: &dyn crate::record::Record) -> Result<IndexRef> {
        if let Some(class) = record.index_class() {
            if class != self.base {
                return Err(TrellisError::WrongElementType {
                    expected: format!("{} index", self.base),
                    found: format!("{class} index"),
                });
            }
        }
        let kind = match record.index_kind() {
            Some(IndexKind::Automatic) => IndexKind::Automatic,
            _ => self.kind,
        };
        let name = record.index_name().unwrap_or_else(|| name.to_string());
        Ok(IndexRef::new(self.base, name, kind))
    }

    fn register(&self, info: IndexRef) -> Index {
        self.client.context().registry_mut().add_index(info.clone());
        Index::new(Arc::clone(&self.client), info)
    }
}
