//! Element proxies
//!
//! [`VertexProxy`] and [`EdgeProxy`] work on schema-less elements and
//! return whatever class the materializer resolves. [`ModelProxy`] works
//! on one registered schema and only ever hands back models of it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::client::{index_for_write, Client, IndexWrite};
use crate::element::{initialize_element, Edge, Element, GraphElement, Vertex};
use crate::error::{absent_if_not_found, Result, TrellisError};
use crate::index::{Index, IndexEntry};
use crate::model::{prepare, wire_data, Model};
use crate::record::Response;
use crate::schema::Schema;
use crate::value::{BaseType, ElementId, JsonMap, PropertyMap};

fn fetch(client: &dyn Client, base: BaseType, id: &ElementId) -> Result<Box<dyn Response>> {
    match base {
        BaseType::Vertex => client.get_vertex(id),
        BaseType::Edge => client.get_edge(id),
    }
}

fn update(
    client: &dyn Client,
    base: BaseType,
    id: &ElementId,
    data: &JsonMap,
    index: Option<IndexWrite<'_>>,
) -> Result<Box<dyn Response>> {
    match base {
        BaseType::Vertex => client.update_vertex(id, data, index),
        BaseType::Edge => client.update_edge(id, data, index),
    }
}

fn remove(client: &dyn Client, base: BaseType, id: &ElementId) -> Result<()> {
    match base {
        BaseType::Vertex => client.delete_vertex(id)?,
        BaseType::Edge => client.delete_edge(id)?,
    };
    Ok(())
}

/// Materialize the single record a write or read answered with
fn materialize_one(
    client: &Arc<dyn Client>,
    response: &dyn Response,
    what: &str,
) -> Result<Element> {
    let record = response
        .one()?
        .ok_or_else(|| TrellisError::NotFound(what.to_string()))?;
    initialize_element(client, record.as_ref())
}

/// Default index name for plain elements, `None` with autoindex off
fn default_index(client: &dyn Client, base: BaseType) -> Option<String> {
    let config = client.config();
    if !config.autoindex {
        return None;
    }
    Some(match base {
        BaseType::Vertex => config.vertex_index.clone(),
        BaseType::Edge => config.edge_index.clone(),
    })
}

/// Schema-less vertex operations
#[derive(Clone)]
pub struct VertexProxy {
    client: Arc<dyn Client>,
}

impl fmt::Debug for VertexProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexProxy")
            .field("backend", &self.client.backend())
            .finish()
    }
}

impl VertexProxy {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    /// Create a vertex and index it in the default vertex index
    pub fn create(&self, data: &PropertyMap) -> Result<Element> {
        let wire = self.client.type_system().database().to_db_map(data)?;
        let index = default_index(self.client.as_ref(), BaseType::Vertex);
        let response = self
            .client
            .create_vertex(&wire, index.as_deref().map(|name| IndexWrite::new(name, None)))?;
        materialize_one(&self.client, response.as_ref(), "created vertex")
    }

    /// Vertex by id; `NotFound` when absent
    pub fn get(&self, id: &ElementId) -> Result<Element> {
        let response = self.client.get_vertex(id)?;
        materialize_one(&self.client, response.as_ref(), &format!("vertex {id}"))
    }

    /// Vertex by id; `None` when absent
    pub fn find(&self, id: &ElementId) -> Result<Option<Element>> {
        absent_if_not_found(self.get(id))
    }

    /// Replace a vertex's properties
    pub fn update(&self, id: &ElementId, data: &PropertyMap) -> Result<Element> {
        let wire = self.client.type_system().database().to_db_map(data)?;
        let index = default_index(self.client.as_ref(), BaseType::Vertex);
        let response = self.client.update_vertex(
            id,
            &wire,
            index.as_deref().map(|name| IndexWrite::new(name, None)),
        )?;
        materialize_one(&self.client, response.as_ref(), &format!("vertex {id}"))
    }

    pub fn delete(&self, id: &ElementId) -> Result<()> {
        remove(self.client.as_ref(), BaseType::Vertex, id)
    }

    /// Default vertex index handle
    pub fn index(&self) -> Index {
        let name = self.client.config().vertex_index.clone();
        Index::new(
            Arc::clone(&self.client),
            index_for_write(self.client.as_ref(), BaseType::Vertex, &name),
        )
    }

    /// Vertex indexed under `key=value`, created with `data` when missing
    pub fn get_or_create(
        &self,
        key: &str,
        value: impl Into<crate::value::Value>,
        data: &PropertyMap,
    ) -> Result<Element> {
        let entry = IndexEntry::new(key, value);
        if let Some(found) = self.index().get_unique(entry.clone())? {
            return Ok(found);
        }
        let mut data = data.clone();
        data.insert(entry.key, entry.value);
        self.create(&data)
    }
}

/// Schema-less edge operations
#[derive(Clone)]
pub struct EdgeProxy {
    client: Arc<dyn Client>,
}

impl fmt::Debug for EdgeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeProxy")
            .field("backend", &self.client.backend())
            .finish()
    }
}

impl EdgeProxy {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    /// Create an edge `out_v -[label]-> in_v`
    pub fn create(
        &self,
        out_v: &ElementId,
        label: &str,
        in_v: &ElementId,
        data: &PropertyMap,
    ) -> Result<Element> {
        let wire = self.client.type_system().database().to_db_map(data)?;
        let index = default_index(self.client.as_ref(), BaseType::Edge);
        let response = self.client.create_edge(
            out_v,
            label,
            in_v,
            &wire,
            index.as_deref().map(|name| IndexWrite::new(name, None)),
        )?;
        materialize_one(&self.client, response.as_ref(), "created edge")
    }

    /// Edge by id; `NotFound` when absent
    pub fn get(&self, id: &ElementId) -> Result<Element> {
        let response = self.client.get_edge(id)?;
        materialize_one(&self.client, response.as_ref(), &format!("edge {id}"))
    }

    /// Edge by id; `None` when absent
    pub fn find(&self, id: &ElementId) -> Result<Option<Element>> {
        absent_if_not_found(self.get(id))
    }

    /// Replace an edge's properties
    pub fn update(&self, id: &ElementId, data: &PropertyMap) -> Result<Element> {
        let wire = self.client.type_system().database().to_db_map(data)?;
        let index = default_index(self.client.as_ref(), BaseType::Edge);
        let response = self.client.update_edge(
            id,
            &wire,
            index.as_deref().map(|name| IndexWrite::new(name, None)),
        )?;
        materialize_one(&self.client, response.as_ref(), &format!("edge {id}"))
    }

    pub fn delete(&self, id: &ElementId) -> Result<()> {
        remove(self.client.as_ref(), BaseType::Edge, id)
    }

    /// Default edge index handle
    pub fn index(&self) -> Index {
        let name = self.client.config().edge_index.clone();
        Index::new(
            Arc::clone(&self.client),
            index_for_write(self.client.as_ref(), BaseType::Edge, &name),
        )
    }
}

/// Typed operations over one registered schema
pub struct ModelProxy<E> {
    client: Arc<dyn Client>,
    schema: Arc<Schema>,
    _element: PhantomData<fn() -> E>,
}

/// Proxy over one node schema
pub type NodeProxy = ModelProxy<Vertex>;

/// Proxy over one relationship schema
pub type RelationshipProxy = ModelProxy<Edge>;

impl<E> Clone for ModelProxy<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            schema: Arc::clone(&self.schema),
            _element: PhantomData,
        }
    }
}

impl<E> fmt::Debug for ModelProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProxy")
            .field("element_type", &self.schema.element_type())
            .field("base", &self.schema.base())
            .finish()
    }
}

impl<E: GraphElement> ModelProxy<E> {
    /// Bind a schema to a client, registering its class
    pub fn new(client: Arc<dyn Client>, schema: Arc<Schema>) -> Result<Self> {
        if schema.base() != E::BASE {
            return Err(TrellisError::WrongElementType {
                expected: E::BASE.to_string(),
                found: schema.base().to_string(),
            });
        }
        client.context().registry_mut().add_class(Arc::clone(&schema));
        Ok(Self {
            client,
            schema,
            _element: PhantomData,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Index this schema writes to on create and update
    pub fn index(&self) -> Result<Index> {
        let name = self.schema.index_name(self.client.config()).ok_or_else(|| {
            TrellisError::Unsupported(format!(
                "'{}' is not indexed with autoindex disabled",
                self.schema.element_type()
            ))
        })?;
        Ok(Index::new(
            Arc::clone(&self.client),
            index_for_write(self.client.as_ref(), E::BASE, name),
        ))
    }

    fn expect_model(&self, element: Element) -> Result<Model<E>> {
        let found = element.element_type().to_string();
        match E::model_from(element) {
            Ok(model) if model.schema().element_type() == self.schema.element_type() => Ok(model),
            _ => Err(TrellisError::WrongElementType {
                expected: self.schema.element_type().to_string(),
                found,
            }),
        }
    }

    /// Validate `data` and encode it for the wire
    fn encode(&self, data: &PropertyMap) -> Result<JsonMap> {
        let (declared, extras) = prepare(&self.schema, data.clone())?;
        wire_data(self.client.as_ref(), &self.schema, &declared, &extras)
    }

    fn index_target(&self) -> (Option<&str>, Option<Vec<String>>) {
        (
            self.schema.index_name(self.client.config()),
            self.schema.index_keys(),
        )
    }

    /// Element by id; `NotFound` when absent, `WrongElementType` for others
    pub fn get(&self, id: &ElementId) -> Result<Model<E>> {
        let response = fetch(self.client.as_ref(), E::BASE, id)?;
        let what = format!("{} {id}", E::BASE);
        let element = materialize_one(&self.client, response.as_ref(), &what)?;
        self.expect_model(element)
    }

    /// Element by id; `None` when absent
    pub fn find(&self, id: &ElementId) -> Result<Option<Model<E>>> {
        absent_if_not_found(self.get(id))
    }

    /// Validate and replace an element's values
    pub fn update(&self, id: &ElementId, data: &PropertyMap) -> Result<Model<E>> {
        let wire = self.encode(data)?;
        let (name, keys) = self.index_target();
        let index = name.map(|name| IndexWrite::new(name, keys.as_deref()));
        let response = update(self.client.as_ref(), E::BASE, id, &wire, index)?;
        let what = format!("{} {id}", E::BASE);
        let element = materialize_one(&self.client, response.as_ref(), &what)?;
        self.expect_model(element)
    }

    pub fn delete(&self, id: &ElementId) -> Result<()> {
        remove(self.client.as_ref(), E::BASE, id)
    }

    /// Look the pair up in this schema's index, keeping only this type
    fn find_indexed(&self, entry: IndexEntry) -> Result<Option<Model<E>>> {
        match self.index()?.get_unique(entry)? {
            Some(element) => self.expect_model(element).map(Some),
            None => Ok(None),
        }
    }
}

impl ModelProxy<Vertex> {
    /// Validate, create and index a node
    pub fn create(&self, data: &PropertyMap) -> Result<Model<Vertex>> {
        let wire = self.encode(data)?;
        let (name, keys) = self.index_target();
        let index = name.map(|name| IndexWrite::new(name, keys.as_deref()));
        let response = self.client.create_vertex(&wire, index)?;
        let element = materialize_one(&self.client, response.as_ref(), "created vertex")?;
        self.expect_model(element)
    }

    /// Node indexed under `key=value`, created with `data` when missing
    pub fn get_or_create(
        &self,
        key: &str,
        value: impl Into<crate::value::Value>,
        data: &PropertyMap,
    ) -> Result<Model<Vertex>> {
        let entry = IndexEntry::new(key, value);
        if let Some(found) = self.find_indexed(entry.clone())? {
            return Ok(found);
        }
        let mut data = data.clone();
        data.insert(entry.key, entry.value);
        self.create(&data)
    }
}

impl ModelProxy<Edge> {
    /// Validate, create and index a relationship labeled with the schema key
    pub fn create(
        &self,
        out_v: &ElementId,
        in_v: &ElementId,
        data: &PropertyMap,
    ) -> Result<Model<Edge>> {
        let wire = self.encode(data)?;
        let (name, keys) = self.index_target();
        let index = name.map(|name| IndexWrite::new(name, keys.as_deref()));
        let response = self.client.create_edge(
            out_v,
            self.schema.element_type(),
            in_v,
            &wire,
            index,
        )?;
        let element = materialize_one(&self.client, response.as_ref(), "created edge")?;
        self.expect_model(element)
    }

    /// Relationship indexed under `key=value`, created when missing
    pub fn get_or_create(
        &self,
        key: &str,
        value: impl Into<crate::value::Value>,
        out_v: &ElementId,
        in_v: &ElementId,
        data: &PropertyMap,
    ) -> Result<Model<Edge>> {
        let entry = IndexEntry::new(key, value);
        if let Some(found) = self.find_indexed(entry.clone())? {
            return Ok(found);
        }
        let mut data = data.clone();
        data.insert(entry.key, entry.value);
        self.create(out_v, in_v, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::graph::Graph;
    use crate::property::Property;
    use crate::testing::MemoryClient;
    use crate::value::Value;

    fn person() -> Arc<Schema> {
        Schema::vertex("person")
            .property(Property::string("name").required().indexed())
            .property(Property::integer("age"))
            .build_shared()
            .unwrap()
    }

    fn knows() -> Arc<Schema> {
        Schema::edge("knows")
            .property(Property::long("since"))
            .build_shared()
            .unwrap()
    }

    fn data(pairs: &[(&str, Value)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn graph() -> (Arc<MemoryClient>, Graph) {
        let mem = MemoryClient::new(Config::default());
        let client: Arc<dyn Client> = mem.clone();
        (mem, Graph::new(client).unwrap())
    }

    #[test]
    fn test_required_null_fails_before_any_call() {
        let (mem, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let before = mem.calls();

        let err = people
            .create(&data(&[("name", Value::Null), ("age", Value::Integer(3))]))
            .unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
        let err = people.create(&data(&[("age", Value::Integer(3))])).unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
        assert_eq!(mem.calls(), before);
    }

    #[test]
    fn test_node_create_get_update() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();

        let james = people
            .create(&data(&[("name", Value::from("James")), ("age", Value::from("34"))]))
            .unwrap();
        assert_eq!(james.get("age"), Some(Value::Integer(34)));

        let fetched = people.get(james.id()).unwrap();
        assert_eq!(fetched.get("name"), Some(Value::from("James")));
        assert_eq!(fetched.schema().element_type(), "person");

        let updated = people
            .update(james.id(), &data(&[("name", Value::from("Jim"))]))
            .unwrap();
        assert_eq!(updated.get("name"), Some(Value::from("Jim")));
        assert_eq!(updated.get("age"), Some(Value::Null));
    }

    #[test]
    fn test_create_indexes_declared_keys() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let james = people
            .create(&data(&[("name", Value::from("James")), ("age", Value::Integer(34))]))
            .unwrap();

        let index = people.index().unwrap();
        let found = index.get_unique(("name", "James")).unwrap().unwrap();
        assert_eq!(found.id(), james.id());
        assert_eq!(index.count(("age", 34)).unwrap(), 0);
    }

    #[test]
    fn test_indexed_create_into_unique_index_keeps_last_writer() {
        let (_, graph) = graph();
        graph
            .vertex_indices(crate::index::IndexKind::Unique)
            .create("handles")
            .unwrap();
        let users = NodeProxy::new(
            Arc::clone(graph.client()),
            Schema::vertex("user")
                .property(Property::string("handle").indexed())
                .index_name("handles")
                .build_shared()
                .unwrap(),
        )
        .unwrap();

        users.create(&data(&[("handle", Value::from("X"))])).unwrap();
        let second = users.create(&data(&[("handle", Value::from("X"))])).unwrap();

        let index = users.index().unwrap();
        assert_eq!(index.count(("handle", "X")).unwrap(), 1);
        let found = index.get_unique(("handle", "X")).unwrap().unwrap();
        assert_eq!(found.id(), second.id());
    }

    #[test]
    fn test_create_then_delete_is_not_found() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let james = people.create(&data(&[("name", Value::from("James"))])).unwrap();
        let id = james.id().clone();

        people.delete(&id).unwrap();
        assert!(people.get(&id).unwrap_err().is_not_found());
        assert!(people.find(&id).unwrap().is_none());
        assert!(graph.vertices.get(&id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_or_create_reuses_indexed_node() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let first = people.get_or_create("name", "James", &PropertyMap::new()).unwrap();
        let second = people
            .get_or_create("name", "James", &data(&[("age", Value::Integer(9))]))
            .unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(second.get("age"), Some(Value::Null));
    }

    #[test]
    fn test_wrong_element_type() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let plain = graph.vertices.create(&data(&[("name", Value::from("x"))])).unwrap();
        assert!(matches!(
            people.get(plain.id()),
            Err(TrellisError::WrongElementType { .. })
        ));
        assert!(matches!(
            RelationshipProxy::new(Arc::clone(graph.client()), person()),
            Err(TrellisError::WrongElementType { .. })
        ));
    }

    #[test]
    fn test_relationship_create_and_traverse() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let knows = RelationshipProxy::new(Arc::clone(graph.client()), knows()).unwrap();

        let a = people.create(&data(&[("name", Value::from("a"))])).unwrap();
        let b = people.create(&data(&[("name", Value::from("b"))])).unwrap();
        let edge = knows
            .create(a.id(), b.id(), &data(&[("since", Value::Integer(2010))]))
            .unwrap();
        assert_eq!(edge.get("since"), Some(Value::Long(2010)));
        assert_eq!(edge.label(), Some("knows"));

        let out: Vec<Element> = a.out_e(Some("knows")).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Element::Relationship(_)));

        let neighbors: Vec<Element> = a.out_v(None).unwrap().collect::<Result<_>>().unwrap();
        assert!(matches!(&neighbors[0], Element::Node(n) if n.id() == b.id()));
    }

    #[test]
    fn test_model_save_round_trip() {
        let (_, graph) = graph();
        let people = NodeProxy::new(Arc::clone(graph.client()), person()).unwrap();
        let mut james = people.create(&data(&[("name", Value::from("James"))])).unwrap();

        james.set("age", "40").unwrap();
        james.set("nickname", "jt").unwrap();
        james.save().unwrap();

        let fetched = people.get(james.id()).unwrap();
        assert_eq!(fetched.get("age"), Some(Value::Integer(40)));
        assert_eq!(fetched.get("nickname"), Some(Value::from("jt")));

        james.set("name", Value::Null).unwrap();
        assert!(matches!(james.save(), Err(TrellisError::Validation(_))));
    }

    #[test]
    fn test_plain_vertex_proxy() {
        let (_, graph) = graph();
        let v = graph
            .vertices
            .create(&data(&[("name", Value::from("James"))]))
            .unwrap();
        assert!(matches!(v, Element::Vertex(_)));

        let found = graph
            .vertices
            .index()
            .lookup(("name", "James"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), v.id());

        let same = graph
            .vertices
            .get_or_create("name", "James", &PropertyMap::new())
            .unwrap();
        assert_eq!(same.id(), v.id());

        let updated = graph
            .vertices
            .update(v.id(), &data(&[("name", Value::from("Jim"))]))
            .unwrap();
        assert_eq!(updated.get("name"), Some(Value::from("Jim")));
        assert!(graph.vertices.index().lookup(("name", "James")).unwrap().next().is_none());
    }

    #[test]
    fn test_plain_edge_proxy() {
        let (_, graph) = graph();
        let a = graph.vertices.create(&PropertyMap::new()).unwrap();
        let b = graph.vertices.create(&PropertyMap::new()).unwrap();
        let e = graph
            .edges
            .create(a.id(), "likes", b.id(), &data(&[("weight", Value::Float(0.5))]))
            .unwrap();
        assert_eq!(e.get("weight"), Some(Value::Float(0.5)));
        assert_eq!(e.get("_label"), Some(Value::from("likes")));

        graph.edges.delete(e.id()).unwrap();
        assert!(graph.edges.find(e.id()).unwrap().is_none());
    }
}
