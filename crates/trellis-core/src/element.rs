//! Vertices, edges and materialization of backend records
//!
//! [`initialize_element`] turns a canonical [`Record`] into a typed
//! [`Element`]: it picks the registered class for the record's type key
//! (falling back to plain vertices and edges) and converts the record's
//! data through the class schema.
//!
//! Every element keeps two namespaces. Identity attributes (`_id`,
//! `_type`, `_outV`, `_inV`, `_label`) are fixed at construction; every
//! other name lives in a free-form property map.

use std::fmt;
use std::sync::Arc;

use crate::client::{Client, IndexWrite};
use crate::error::{Result, TrellisError};
use crate::model::{Model, Node, Relationship};
use crate::record::{Record, Records, Response, Results};
use crate::value::{BaseType, Direction, ElementId, JsonMap, PropertyMap, Value};

/// Attribute names reserved for element identity
pub const RESERVED_ATTRIBUTES: [&str; 5] = ["_id", "_type", "_outV", "_inV", "_label"];

fn id_value(id: &ElementId) -> Value {
    match id {
        ElementId::Int(n) => Value::Long(*n),
        ElementId::Str(s) => Value::String(s.clone()),
    }
}

/// Identity from the record, or from the configured id property
fn record_id(client: &dyn Client, record: &dyn Record) -> Option<ElementId> {
    record.id().or_else(|| {
        record
            .data()
            .get(&client.config().id_var)
            .and_then(ElementId::from_json)
    })
}

/// Edge label from the record, or from the configured label property
fn record_label(client: &dyn Client, record: &dyn Record) -> Option<String> {
    record.label().or_else(|| {
        record
            .data()
            .get(&client.config().label_var)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

/// State shared by every vertex and edge
#[derive(Clone)]
pub struct ElementCore {
    client: Arc<dyn Client>,
    id: ElementId,
    base: BaseType,
    element_type: String,
    uri: Option<String>,
    properties: PropertyMap,
    out_v: Option<ElementId>,
    in_v: Option<ElementId>,
    label: Option<String>,
}

impl fmt::Debug for ElementCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCore")
            .field("id", &self.id)
            .field("base", &self.base)
            .field("element_type", &self.element_type)
            .field("uri", &self.uri)
            .field("properties", &self.properties)
            .field("out_v", &self.out_v)
            .field("in_v", &self.in_v)
            .field("label", &self.label)
            .finish()
    }
}

impl ElementCore {
    /// Build from a record, with `data` as the remaining free-form wire data
    pub(crate) fn from_record(
        client: &Arc<dyn Client>,
        record: &dyn Record,
        element_type: String,
        data: &JsonMap,
    ) -> Result<Self> {
        let base = record.base_type().ok_or_else(|| {
            TrellisError::Decode(format!("record is not an element: {}", record.raw()))
        })?;
        let id = record_id(client.as_ref(), record).ok_or_else(|| {
            TrellisError::Decode(format!("{base} record has no id: {}", record.raw()))
        })?;

        let (out_v, in_v, label) = match base {
            BaseType::Vertex => (None, None, None),
            BaseType::Edge => (
                record.out_v(),
                record.in_v(),
                record_label(client.as_ref(), record),
            ),
        };

        Ok(Self {
            client: Arc::clone(client),
            id,
            base,
            element_type,
            uri: record.uri(),
            properties: client.type_system().host().to_host_map(data),
            out_v,
            in_v,
            label,
        })
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn base(&self) -> BaseType {
        self.base
    }

    /// Registered type key, or the base type for plain elements
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Free-form properties
    pub fn data(&self) -> &PropertyMap {
        &self.properties
    }

    /// Identity attribute or free-form property by name
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "_id" => Some(id_value(&self.id)),
            "_type" => Some(Value::from(self.base.as_str())),
            "_outV" => self.out_v.as_ref().map(id_value),
            "_inV" => self.in_v.as_ref().map(id_value),
            "_label" => self.label.clone().map(Value::String),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Set a free-form property; identity attributes are read-only
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if RESERVED_ATTRIBUTES.contains(&key.as_str()) {
            return Err(TrellisError::ReadOnly(format!(
                "'{key}' is an identity attribute of {} {}",
                self.base, self.id
            )));
        }
        self.properties.insert(key, value.into());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Outgoing vertex id of an edge
    pub fn out_v_id(&self) -> Option<&ElementId> {
        self.out_v.as_ref()
    }

    /// Incoming vertex id of an edge
    pub fn in_v_id(&self) -> Option<&ElementId> {
        self.in_v.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    pub(crate) fn update_on_backend(
        &self,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        match self.base {
            BaseType::Vertex => self.client.update_vertex(&self.id, data, index),
            BaseType::Edge => self.client.update_edge(&self.id, data, index),
        }
    }

    /// Index a plain element is written to, per config
    fn default_index(&self) -> Option<&str> {
        let config = self.client.config();
        if !config.autoindex {
            return None;
        }
        Some(match self.base {
            BaseType::Vertex => config.vertex_index.as_str(),
            BaseType::Edge => config.edge_index.as_str(),
        })
    }

    /// Persist the free-form properties of a plain element
    pub fn save(&mut self) -> Result<()> {
        let data = self
            .client
            .type_system()
            .database()
            .to_db_map(&self.properties)?;
        let index = self.default_index().map(|name| IndexWrite::new(name, None));
        let response = self.update_on_backend(&data, index)?;
        if let Some(record) = response.one()? {
            let element_type = self.element_type.clone();
            *self = Self::from_record(&self.client, record.as_ref(), element_type, &record.data())?;
        }
        Ok(())
    }
}

/// Behavior shared by the concrete element types
pub trait GraphElement: Sized + Send {
    const BASE: BaseType;

    fn core(&self) -> &ElementCore;

    fn core_mut(&mut self) -> &mut ElementCore;

    fn from_core(core: ElementCore) -> Self;

    /// Unwrap a materialized element as a model of this base
    fn model_from(element: Element) -> std::result::Result<Model<Self>, Element>;
}

/// A plain vertex
#[derive(Debug, Clone)]
pub struct Vertex {
    core: ElementCore,
}

/// A plain edge
#[derive(Debug, Clone)]
pub struct Edge {
    core: ElementCore,
}

impl GraphElement for Vertex {
    const BASE: BaseType = BaseType::Vertex;

    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn from_core(core: ElementCore) -> Self {
        Self { core }
    }

    fn model_from(element: Element) -> std::result::Result<Node, Element> {
        match element {
            Element::Node(node) => Ok(node),
            other => Err(other),
        }
    }
}

impl GraphElement for Edge {
    const BASE: BaseType = BaseType::Edge;

    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn from_core(core: ElementCore) -> Self {
        Self { core }
    }

    fn model_from(element: Element) -> std::result::Result<Relationship, Element> {
        match element {
            Element::Relationship(rel) => Ok(rel),
            other => Err(other),
        }
    }
}

impl std::ops::Deref for Vertex {
    type Target = ElementCore;

    fn deref(&self) -> &ElementCore {
        &self.core
    }
}

impl std::ops::DerefMut for Vertex {
    fn deref_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
}

impl std::ops::Deref for Edge {
    type Target = ElementCore;

    fn deref(&self) -> &ElementCore {
        &self.core
    }
}

impl std::ops::DerefMut for Edge {
    fn deref_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
}

impl Vertex {
    fn edges(&self, direction: Direction, label: Option<&str>) -> Result<Elements> {
        let response = self.core.client.vertex_edges(&self.core.id, direction, label)?;
        Ok(Elements::new(Arc::clone(&self.core.client), response.results()))
    }

    fn vertices(&self, direction: Direction, label: Option<&str>) -> Result<Elements> {
        let response = self
            .core
            .client
            .adjacent_vertices(&self.core.id, direction, label)?;
        Ok(Elements::new(Arc::clone(&self.core.client), response.results()))
    }

    /// Outgoing edges
    pub fn out_e(&self, label: Option<&str>) -> Result<Elements> {
        self.edges(Direction::Out, label)
    }

    /// Incoming edges
    pub fn in_e(&self, label: Option<&str>) -> Result<Elements> {
        self.edges(Direction::In, label)
    }

    pub fn both_e(&self, label: Option<&str>) -> Result<Elements> {
        self.edges(Direction::Both, label)
    }

    /// Vertices at the head of outgoing edges
    pub fn out_v(&self, label: Option<&str>) -> Result<Elements> {
        self.vertices(Direction::Out, label)
    }

    /// Vertices at the tail of incoming edges
    pub fn in_v(&self, label: Option<&str>) -> Result<Elements> {
        self.vertices(Direction::In, label)
    }

    pub fn both_v(&self, label: Option<&str>) -> Result<Elements> {
        self.vertices(Direction::Both, label)
    }
}

impl Edge {
    fn endpoint(&self, id: Option<&ElementId>, which: &str) -> Result<Element> {
        let id = id.ok_or_else(|| {
            TrellisError::Decode(format!("edge {} has no {which} vertex", self.core.id))
        })?;
        let response = self.core.client.get_vertex(id)?;
        let record = response
            .one()?
            .ok_or_else(|| TrellisError::NotFound(format!("vertex {id}")))?;
        initialize_element(&self.core.client, record.as_ref())
    }

    /// Vertex the edge leaves
    pub fn out_vertex(&self) -> Result<Element> {
        self.endpoint(self.core.out_v.as_ref(), "outgoing")
    }

    /// Vertex the edge enters
    pub fn in_vertex(&self) -> Result<Element> {
        self.endpoint(self.core.in_v.as_ref(), "incoming")
    }
}

/// A materialized element of any registered or built-in type
#[derive(Debug, Clone)]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
    Node(Node),
    Relationship(Relationship),
}

impl Element {
    pub fn core(&self) -> &ElementCore {
        match self {
            Self::Vertex(v) => v.core(),
            Self::Edge(e) => e.core(),
            Self::Node(n) => n.element().core(),
            Self::Relationship(r) => r.element().core(),
        }
    }

    pub fn id(&self) -> &ElementId {
        self.core().id()
    }

    pub fn base(&self) -> BaseType {
        self.core().base()
    }

    pub fn element_type(&self) -> &str {
        self.core().element_type()
    }

    /// Declared property, identity attribute or free-form property
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Self::Node(n) => n.get(key),
            Self::Relationship(r) => r.get(key),
            _ => self.core().get(key),
        }
    }

    /// All properties, declared ones included
    pub fn data(&self) -> PropertyMap {
        match self {
            Self::Node(n) => n.data(),
            Self::Relationship(r) => r.data(),
            _ => self.core().data().clone(),
        }
    }

    /// Vertex view; models expose their wrapped vertex
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            Self::Node(n) => Some(n.element()),
            _ => None,
        }
    }

    /// Edge view; models expose their wrapped edge
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Edge(e) => Some(e),
            Self::Relationship(r) => Some(r.element()),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_relationship(self) -> Option<Relationship> {
        match self {
            Self::Relationship(r) => Some(r),
            _ => None,
        }
    }
}

/// Lazily materialized elements from one response
pub struct Elements {
    client: Arc<dyn Client>,
    records: Records,
}

impl fmt::Debug for Elements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements")
            .field("total", &self.records.total_size())
            .finish()
    }
}

impl Elements {
    pub fn new(client: Arc<dyn Client>, results: Results) -> Self {
        Self {
            client,
            records: results.into_iter(),
        }
    }

    pub fn empty(client: Arc<dyn Client>) -> Self {
        Self::new(client, Results::Empty)
    }

    /// Total reported by the backend
    pub fn total_size(&self) -> usize {
        self.records.total_size()
    }
}

impl Iterator for Elements {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .next()
            .map(|record| initialize_element(&self.client, record.as_ref()))
    }
}

/// Type key a record is materialized under
///
/// Vertices use the configured type property, edges their label when a
/// class is registered for it; both fall back to the base type.
pub fn element_type_key(client: &dyn Client, record: &dyn Record, base: BaseType) -> String {
    match base {
        BaseType::Vertex => record
            .data()
            .get(&client.config().type_var)
            .and_then(|v| v.as_str())
            .filter(|key| !key.is_empty())
            .map_or_else(|| base.as_str().to_string(), str::to_string),
        BaseType::Edge => record_label(client, record)
            .filter(|label| client.registry().has_class(label))
            .unwrap_or_else(|| base.as_str().to_string()),
    }
}

/// Materialize a record as the registered class for its type key
pub fn initialize_element(client: &Arc<dyn Client>, record: &dyn Record) -> Result<Element> {
    let base = record.base_type().ok_or_else(|| {
        TrellisError::Decode(format!("record is not an element: {}", record.raw()))
    })?;
    let key = element_type_key(client.as_ref(), record, base);
    let class = client.registry().get_class(&key).filter(|s| s.base() == base);

    match (base, class) {
        (BaseType::Vertex, Some(schema)) => {
            Model::initialize(client, record, schema).map(Element::Node)
        }
        (BaseType::Edge, Some(schema)) => {
            Model::initialize(client, record, schema).map(Element::Relationship)
        }
        (BaseType::Vertex, None) => ElementCore::from_record(client, record, key, &record.data())
            .map(|core| Element::Vertex(Vertex::from_core(core))),
        (BaseType::Edge, None) => ElementCore::from_record(client, record, key, &record.data())
            .map(|core| Element::Edge(Edge::from_core(core))),
    }
}
