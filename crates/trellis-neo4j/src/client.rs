//! Neo4j Server REST client

use serde_json::{json, Value as JsonValue};
use std::fmt;

use trellis_core::client::{index_for_write, register_scripts, write_index_entries};
use trellis_core::{
    handle_response, BaseType, Client, ClientContext, Config, Direction, ElementId, HttpRequest,
    HttpTransport, IndexKind, IndexRef, IndexWrite, JsonMap, Record, Response, Result, Transport,
    TrellisError,
};

use crate::record::{class_segment, Neo4jResponse, NODE_AUTO_INDEX, RELATIONSHIP_AUTO_INDEX};

/// Namespace the bundled scripts are registered under
pub const SCRIPT_NAMESPACE: &str = "gremlin";

const GREMLIN_SCRIPTS: &str = include_str!("gremlin.groovy");

/// Client for the Neo4j Server REST API
pub struct Neo4jClient {
    context: ClientContext,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for Neo4jClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jClient")
            .field("root", &self.context.config().root())
            .finish()
    }
}

fn auto_index_name(base: BaseType) -> &'static str {
    match base {
        BaseType::Vertex => NODE_AUTO_INDEX,
        BaseType::Edge => RELATIONSHIP_AUTO_INDEX,
    }
}

fn is_auto_index(index: &IndexRef) -> bool {
    index.kind == IndexKind::Automatic || index.name == auto_index_name(index.base)
}

/// Neo4j rejects null property values
fn strip_nulls(data: &JsonMap) -> JsonMap {
    data.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Index values travel as path segments
fn value_segment(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn direction_segment(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "out",
        Direction::In => "in",
        Direction::Both => "all",
    }
}

impl Neo4jClient {
    /// Connect over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Use a custom transport
    pub fn with_transport(config: Config, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let context = ClientContext::new(config);
        register_scripts(&context, SCRIPT_NAMESPACE, GREMLIN_SCRIPTS)?;
        Ok(Self { context, transport })
    }

    fn send(&self, request: HttpRequest) -> Result<Neo4jResponse> {
        let method = request.method;
        let path = request.path();
        let response = self.transport.send(request)?;
        tracing::debug!("neo4j {} {} -> {}", method, path, response.status);
        handle_response(response.status, &response.body)?;
        Neo4jResponse::from_http(response)
    }

    fn locator(&self, base: BaseType, id: &ElementId) -> String {
        format!("{}/{}/{}", self.config().root(), class_segment(base), id)
    }

    fn auto_template(&self, base: BaseType) -> JsonValue {
        json!({
            "template": format!(
                "{}/index/auto/{}/{{key}}/{{value}}",
                self.config().root(),
                class_segment(base)
            )
        })
    }

    fn index_segments(index: &IndexRef) -> Vec<String> {
        if is_auto_index(index) {
            vec![
                "index".to_string(),
                "auto".to_string(),
                class_segment(index.base).to_string(),
            ]
        } else {
            vec![
                "index".to_string(),
                class_segment(index.base).to_string(),
                index.name.clone(),
            ]
        }
    }

    /// Index an element just written, per the caller's index target
    fn index_written(
        &self,
        base: BaseType,
        response: &dyn Response,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
        replace: bool,
    ) -> Result<()> {
        let Some(write) = index else {
            return Ok(());
        };
        let id = response
            .one()?
            .and_then(|record| record.id())
            .ok_or_else(|| TrellisError::Decode(format!("neo4j returned no {base} to index")))?;
        let target = index_for_write(self, base, write.name);
        write_index_entries(self, &target, &id, data, write.keys, replace, None)
    }

    fn delete_element(&self, base: BaseType, id: &ElementId) -> Result<Box<dyn Response>> {
        let request = HttpRequest::delete([class_segment(base).to_string(), id.to_string()]);
        Ok(Box::new(self.send(request)?))
    }
}

impl Client for Neo4jClient {
    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn backend(&self) -> &str {
        "neo4j"
    }

    fn create_vertex(
        &self,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let data = strip_nulls(data);
        let request = HttpRequest::post(["node"]).json(JsonValue::Object(data.clone()));
        let response = self.send(request)?;
        self.index_written(BaseType::Vertex, &response, &data, index, false)?;
        Ok(Box::new(response))
    }

    fn get_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::get(["node".to_string(), id.to_string()]))?))
    }

    fn update_vertex(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let data = strip_nulls(data);
        let request =
            HttpRequest::put(["node".to_string(), id.to_string(), "properties".to_string()])
                .json(JsonValue::Object(data.clone()));
        self.send(request)?;
        let response = self.get_vertex(id)?;
        self.index_written(BaseType::Vertex, response.as_ref(), &data, index, true)?;
        Ok(response)
    }

    /// Deletes the node's relationships first; Neo4j refuses to orphan them
    fn delete_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        let relationships = self.vertex_edges(id, Direction::Both, None)?;
        for record in relationships.results() {
            if let Some(edge_id) = record.id() {
                self.delete_edge(&edge_id)?;
            }
        }
        self.delete_element(BaseType::Vertex, id)
    }

    fn create_edge(
        &self,
        out_v: &ElementId,
        label: &str,
        in_v: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let data = strip_nulls(data);
        let segments = [
            "node".to_string(),
            out_v.to_string(),
            "relationships".to_string(),
        ];
        let request = HttpRequest::post(segments).json(json!({
            "to": self.locator(BaseType::Vertex, in_v),
            "type": label,
            "data": data,
        }));
        let response = self.send(request)?;
        self.index_written(BaseType::Edge, &response, &data, index, false)?;
        Ok(Box::new(response))
    }

    fn get_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::get([
            "relationship".to_string(),
            id.to_string(),
        ]))?))
    }

    fn update_edge(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let data = strip_nulls(data);
        let request = HttpRequest::put([
            "relationship".to_string(),
            id.to_string(),
            "properties".to_string(),
        ])
        .json(JsonValue::Object(data.clone()));
        self.send(request)?;
        let response = self.get_edge(id)?;
        self.index_written(BaseType::Edge, response.as_ref(), &data, index, true)?;
        Ok(response)
    }

    fn delete_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        self.delete_element(BaseType::Edge, id)
    }

    fn vertex_edges(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let mut segments = vec![
            "node".to_string(),
            id.to_string(),
            "relationships".to_string(),
            direction_segment(direction).to_string(),
        ];
        if let Some(label) = label {
            segments.push(label.to_string());
        }
        Ok(Box::new(self.send(HttpRequest::get(segments))?))
    }

    /// Resolved from relationship endpoints, one node read per neighbor
    fn adjacent_vertices(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let edges = self.vertex_edges(id, direction, label)?;
        let mut nodes = Vec::new();
        for record in edges.results() {
            let neighbor = match (record.out_v(), record.in_v()) {
                (Some(out_v), Some(in_v)) if &out_v == id => in_v,
                (Some(out_v), Some(_)) => out_v,
                _ => continue,
            };
            let node = self.send(HttpRequest::get(["node".to_string(), neighbor.to_string()]))?;
            if let Some(raw) = node.content() {
                nodes.push(raw.clone());
            }
        }
        Ok(Box::new(Neo4jResponse::synthetic(JsonValue::Array(nodes))))
    }

    fn create_index(&self, index: &IndexRef) -> Result<Box<dyn Response>> {
        if is_auto_index(index) {
            let class = class_segment(index.base);
            self.send(
                HttpRequest::put(["index", "auto", class, "status"]).json(JsonValue::Bool(true)),
            )?;
            return Ok(Box::new(Neo4jResponse::synthetic(self.auto_template(index.base))));
        }
        let request = HttpRequest::post(["index", class_segment(index.base)]).json(json!({
            "name": index.name,
            "config": {"type": "exact", "provider": "lucene"},
        }));
        Ok(Box::new(self.send(request)?))
    }

    fn get_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        let class = class_segment(base);
        if name == auto_index_name(base) {
            let status = self.send(HttpRequest::get(["index", "auto", class, "status"]))?;
            return match status.content() {
                Some(JsonValue::Bool(true)) => {
                    Ok(Box::new(Neo4jResponse::synthetic(self.auto_template(base))))
                }
                _ => Err(TrellisError::NotFound(format!("{name} is disabled"))),
            };
        }
        let listing = self.send(HttpRequest::get(["index", class]))?;
        listing
            .content()
            .and_then(|content| content.get(name))
            .map(|info| Box::new(Neo4jResponse::synthetic(info.clone())) as Box<dyn Response>)
            .ok_or_else(|| TrellisError::NotFound(format!("{base} index '{name}'")))
    }

    fn delete_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        if name == auto_index_name(base) {
            return Err(TrellisError::Unsupported(format!(
                "{name} is configured on the server"
            )));
        }
        let request = HttpRequest::delete(["index", class_segment(base), name]);
        Ok(Box::new(self.send(request)?))
    }

    fn put_index_entry(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
        id: &ElementId,
    ) -> Result<Box<dyn Response>> {
        if is_auto_index(index) {
            return Err(TrellisError::ReadOnly(format!("{} is automatic", index.name)));
        }
        let request = HttpRequest::post(Self::index_segments(index)).json(json!({
            "key": key,
            "value": value,
            "uri": self.locator(index.base, id),
        }));
        Ok(Box::new(self.send(request)?))
    }

    fn lookup_index(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
    ) -> Result<Box<dyn Response>> {
        let mut segments = Self::index_segments(index);
        segments.push(key.to_string());
        segments.push(value_segment(value));
        Ok(Box::new(self.send(HttpRequest::get(segments))?))
    }

    fn remove_index_entry(
        &self,
        index: &IndexRef,
        id: &ElementId,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<Box<dyn Response>> {
        if is_auto_index(index) {
            return Err(TrellisError::ReadOnly(format!("{} is automatic", index.name)));
        }
        let mut segments = Self::index_segments(index);
        if let Some(key) = key {
            segments.push(key.to_string());
            if let Some(value) = value {
                segments.push(value_segment(value));
            }
        }
        segments.push(id.to_string());
        Ok(Box::new(self.send(HttpRequest::delete(segments))?))
    }

    /// Neo4j has no count endpoint; counts the lookup
    fn count_index(&self, index: &IndexRef, key: &str, value: &JsonValue) -> Result<u64> {
        let response = self.lookup_index(index, key, value)?;
        Ok(response.total_size() as u64)
    }

    fn gremlin(&self, script: &str, params: &JsonMap) -> Result<Box<dyn Response>> {
        let request = HttpRequest::post(["ext", "GremlinPlugin", "graphdb", "execute_script"])
            .json(json!({"script": script, "params": params}));
        Ok(Box::new(self.send(request)?))
    }
}
