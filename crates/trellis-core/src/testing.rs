//! In-memory client used by the unit tests

use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{index_for_write, write_index_entries, Client, ClientContext, IndexWrite};
use crate::config::Config;
use crate::error::{Result, TrellisError};
use crate::index::{IndexKind, IndexRef};
use crate::record::{Record, Response, Results};
use crate::value::{BaseType, Direction, ElementId, JsonMap};

/// Record in the explicit-field encoding
#[derive(Debug, Clone)]
pub struct MemRecord(JsonValue);

impl MemRecord {
    pub fn new(raw: JsonValue) -> Self {
        Self(raw)
    }

    fn field(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }
}

impl Record for MemRecord {
    fn raw(&self) -> &JsonValue {
        &self.0
    }

    fn id(&self) -> Option<ElementId> {
        self.field("_id").and_then(ElementId::from_json)
    }

    fn base_type(&self) -> Option<BaseType> {
        self.field("_type").and_then(JsonValue::as_str).and_then(BaseType::parse)
    }

    fn data(&self) -> JsonMap {
        self.0
            .as_object()
            .map(|map| {
                map.iter()
                    .filter(|(k, _)| !k.starts_with('_'))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn uri(&self) -> Option<String> {
        let id = self.id()?;
        Some(format!("mem://{}/{id}", self.base_type()?))
    }

    fn out_v(&self) -> Option<ElementId> {
        self.field("_outV").and_then(ElementId::from_json)
    }

    fn in_v(&self) -> Option<ElementId> {
        self.field("_inV").and_then(ElementId::from_json)
    }

    fn label(&self) -> Option<String> {
        self.field("_label").and_then(JsonValue::as_str).map(str::to_string)
    }

    fn index_name(&self) -> Option<String> {
        self.field("name").and_then(JsonValue::as_str).map(str::to_string)
    }

    fn index_class(&self) -> Option<BaseType> {
        self.field("class").and_then(JsonValue::as_str).and_then(BaseType::parse)
    }

    fn index_kind(&self) -> Option<IndexKind> {
        match self.field("type").and_then(JsonValue::as_str) {
            Some("automatic") => Some(IndexKind::Automatic),
            Some("unique") => Some(IndexKind::Unique),
            Some("exact") => Some(IndexKind::Exact),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct MemResponse {
    content: Option<JsonValue>,
    records: Vec<MemRecord>,
    headers: BTreeMap<String, String>,
}

impl MemResponse {
    fn new(records: Vec<JsonValue>) -> Self {
        Self {
            content: Some(JsonValue::Array(records.clone())),
            records: records.into_iter().map(MemRecord::new).collect(),
            headers: BTreeMap::new(),
        }
    }

    fn empty() -> Box<dyn Response> {
        Box::new(Self::new(Vec::new()))
    }

    fn one(raw: JsonValue) -> Box<dyn Response> {
        Box::new(Self::new(vec![raw]))
    }
}

impl Response for MemResponse {
    fn status(&self) -> u16 {
        200
    }

    fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    fn content(&self) -> Option<&JsonValue> {
        self.content.as_ref()
    }

    fn results(&self) -> Results {
        Results::from_records(
            self.records
                .iter()
                .cloned()
                .map(|r| Box::new(r) as Box<dyn Record>)
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
struct StoredEdge {
    out_v: i64,
    label: String,
    in_v: i64,
    data: JsonMap,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    vertices: BTreeMap<i64, JsonMap>,
    edges: BTreeMap<i64, StoredEdge>,
    indices: BTreeMap<String, (IndexRef, Vec<(String, JsonValue, i64)>)>,
}

/// Stateful in-memory graph speaking the canonical contract directly
pub struct MemoryClient {
    context: ClientContext,
    state: Mutex<State>,
    calls: AtomicUsize,
}

fn vertex_json(id: i64, data: &JsonMap) -> JsonValue {
    let mut raw = data.clone();
    raw.insert("_id".to_string(), json!(id));
    raw.insert("_type".to_string(), json!("vertex"));
    JsonValue::Object(raw)
}

fn edge_json(id: i64, edge: &StoredEdge) -> JsonValue {
    let mut raw = edge.data.clone();
    raw.insert("_id".to_string(), json!(id));
    raw.insert("_type".to_string(), json!("edge"));
    raw.insert("_outV".to_string(), json!(edge.out_v));
    raw.insert("_inV".to_string(), json!(edge.in_v));
    raw.insert("_label".to_string(), json!(edge.label));
    JsonValue::Object(raw)
}

fn index_json(index: &IndexRef) -> JsonValue {
    json!({"name": index.name, "class": index.base.as_str(), "type": index.kind.as_str()})
}

fn int_id(id: &ElementId) -> Result<i64> {
    match id {
        ElementId::Int(n) => Ok(*n),
        ElementId::Str(s) => Err(TrellisError::NotFound(format!("element {s}"))),
    }
}

impl MemoryClient {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            context: ClientContext::new(config),
            state: Mutex::new(State::default()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Client with the default vertex and edge indices present
    pub fn shared() -> Arc<dyn Client> {
        Self::new(Config::default())
    }

    /// Number of backend calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn index_after_write(
        &self,
        base: BaseType,
        id: i64,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
        replace: bool,
    ) -> Result<()> {
        if let Some(write) = index {
            let target = index_for_write(self, base, write.name);
            write_index_entries(
                self,
                &target,
                &ElementId::Int(id),
                data,
                write.keys,
                replace,
                None,
            )?;
        }
        Ok(())
    }

    fn element_json(state: &State, id: i64) -> Option<JsonValue> {
        state
            .vertices
            .get(&id)
            .map(|data| vertex_json(id, data))
            .or_else(|| state.edges.get(&id).map(|edge| edge_json(id, edge)))
    }
}

impl Client for MemoryClient {
    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn backend(&self) -> &str {
        "memory"
    }

    fn create_vertex(
        &self,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let (id, raw) = {
            let mut state = self.state();
            state.next_id += 1;
            let id = state.next_id;
            state.vertices.insert(id, data.clone());
            (id, vertex_json(id, data))
        };
        self.index_after_write(BaseType::Vertex, id, data, index, false)?;
        Ok(MemResponse::one(raw))
    }

    fn get_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let state = self.state();
        let data = state
            .vertices
            .get(&id)
            .ok_or_else(|| TrellisError::NotFound(format!("vertex {id}")))?;
        Ok(MemResponse::one(vertex_json(id, data)))
    }

    fn update_vertex(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        {
            let mut state = self.state();
            let stored = state
                .vertices
                .get_mut(&id)
                .ok_or_else(|| TrellisError::NotFound(format!("vertex {id}")))?;
            *stored = data.clone();
        }
        self.index_after_write(BaseType::Vertex, id, data, index, true)?;
        Ok(MemResponse::one(vertex_json(id, data)))
    }

    fn delete_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let mut state = self.state();
        state
            .vertices
            .remove(&id)
            .ok_or_else(|| TrellisError::NotFound(format!("vertex {id}")))?;
        state.edges.retain(|_, e| e.out_v != id && e.in_v != id);
        for (_, entries) in state.indices.values_mut() {
            entries.retain(|(_, _, eid)| *eid != id);
        }
        Ok(MemResponse::empty())
    }

    fn create_edge(
        &self,
        out_v: &ElementId,
        label: &str,
        in_v: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let (out_v, in_v) = (int_id(out_v)?, int_id(in_v)?);
        let (id, raw) = {
            let mut state = self.state();
            if !state.vertices.contains_key(&out_v) || !state.vertices.contains_key(&in_v) {
                return Err(TrellisError::NotFound("edge endpoint".to_string()));
            }
            state.next_id += 1;
            let id = state.next_id;
            let edge = StoredEdge {
                out_v,
                label: label.to_string(),
                in_v,
                data: data.clone(),
            };
            let raw = edge_json(id, &edge);
            state.edges.insert(id, edge);
            (id, raw)
        };
        self.index_after_write(BaseType::Edge, id, data, index, false)?;
        Ok(MemResponse::one(raw))
    }

    fn get_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let state = self.state();
        let edge = state
            .edges
            .get(&id)
            .ok_or_else(|| TrellisError::NotFound(format!("edge {id}")))?;
        Ok(MemResponse::one(edge_json(id, edge)))
    }

    fn update_edge(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let raw = {
            let mut state = self.state();
            let edge = state
                .edges
                .get_mut(&id)
                .ok_or_else(|| TrellisError::NotFound(format!("edge {id}")))?;
            edge.data = data.clone();
            edge_json(id, edge)
        };
        self.index_after_write(BaseType::Edge, id, data, index, true)?;
        Ok(MemResponse::one(raw))
    }

    fn delete_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        self.state()
            .edges
            .remove(&id)
            .ok_or_else(|| TrellisError::NotFound(format!("edge {id}")))?;
        Ok(MemResponse::empty())
    }

    fn vertex_edges(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let state = self.state();
        let records = state
            .edges
            .iter()
            .filter(|(_, e)| match direction {
                Direction::Out => e.out_v == id,
                Direction::In => e.in_v == id,
                Direction::Both => e.out_v == id || e.in_v == id,
            })
            .filter(|(_, e)| label.map_or(true, |l| e.label == l))
            .map(|(eid, e)| edge_json(*eid, e))
            .collect();
        Ok(Box::new(MemResponse::new(records)))
    }

    fn adjacent_vertices(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let state = self.state();
        let records = state
            .edges
            .values()
            .filter(|e| label.map_or(true, |l| e.label == l))
            .filter_map(|e| match direction {
                Direction::Out if e.out_v == id => Some(e.in_v),
                Direction::In if e.in_v == id => Some(e.out_v),
                Direction::Both if e.out_v == id => Some(e.in_v),
                Direction::Both if e.in_v == id => Some(e.out_v),
                _ => None,
            })
            .filter_map(|vid| state.vertices.get(&vid).map(|data| vertex_json(vid, data)))
            .collect();
        Ok(Box::new(MemResponse::new(records)))
    }

    fn create_index(&self, index: &IndexRef) -> Result<Box<dyn Response>> {
        let mut state = self.state();
        if state.indices.contains_key(&index.name) {
            return Err(TrellisError::Backend {
                status: 409,
                message: format!("index '{}' exists", index.name),
            });
        }
        state
            .indices
            .insert(index.name.clone(), (index.clone(), Vec::new()));
        Ok(MemResponse::one(index_json(index)))
    }

    fn get_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        let state = self.state();
        match state.indices.get(name) {
            Some((index, _)) if index.base == base => Ok(MemResponse::one(index_json(index))),
            _ => Err(TrellisError::NotFound(format!("index '{name}'"))),
        }
    }

    fn delete_index(&self, _base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        self.state()
            .indices
            .remove(name)
            .ok_or_else(|| TrellisError::NotFound(format!("index '{name}'")))?;
        Ok(MemResponse::empty())
    }

    fn put_index_entry(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
        id: &ElementId,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let mut state = self.state();
        let (_, entries) = state
            .indices
            .get_mut(&index.name)
            .ok_or_else(|| TrellisError::NotFound(format!("index '{}'", index.name)))?;
        entries.push((key.to_string(), value.clone(), id));
        Ok(MemResponse::empty())
    }

    fn lookup_index(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
    ) -> Result<Box<dyn Response>> {
        let state = self.state();
        let (_, entries) = state
            .indices
            .get(&index.name)
            .ok_or_else(|| TrellisError::NotFound(format!("index '{}'", index.name)))?;
        let records = entries
            .iter()
            .filter(|(k, v, _)| k == key && v == value)
            .filter_map(|(_, _, id)| Self::element_json(&state, *id))
            .collect();
        Ok(Box::new(MemResponse::new(records)))
    }

    fn remove_index_entry(
        &self,
        index: &IndexRef,
        id: &ElementId,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<Box<dyn Response>> {
        let id = int_id(id)?;
        let mut state = self.state();
        let (_, entries) = state
            .indices
            .get_mut(&index.name)
            .ok_or_else(|| TrellisError::NotFound(format!("index '{}'", index.name)))?;
        entries.retain(|(k, v, eid)| {
            !(*eid == id
                && key.map_or(true, |key| k == key)
                && value.map_or(true, |value| v == value))
        });
        Ok(MemResponse::empty())
    }

    fn count_index(&self, index: &IndexRef, key: &str, value: &JsonValue) -> Result<u64> {
        let state = self.state();
        let (_, entries) = state
            .indices
            .get(&index.name)
            .ok_or_else(|| TrellisError::NotFound(format!("index '{}'", index.name)))?;
        Ok(entries.iter().filter(|(k, v, _)| k == key && v == value).count() as u64)
    }

    fn gremlin(&self, script: &str, _params: &JsonMap) -> Result<Box<dyn Response>> {
        Err(TrellisError::Unsupported(format!("gremlin on memory client: {script}")))
    }
}
