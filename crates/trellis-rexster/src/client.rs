//! Rexster REST client
//!
//! One client serves both Rexster-hosted graphs with manual indices and
//! Titan graphs, which only have backend-maintained key indices. The
//! [`Flavor`] decides how index calls are routed; element and traversal
//! calls are identical.

use serde_json::{json, Value as JsonValue};
use std::fmt;

use trellis_core::client::{index_for_write, register_scripts, write_index_entries};
use trellis_core::{
    handle_response, BaseType, Client, ClientContext, Config, Direction, ElementId, HttpRequest,
    HttpTransport, IndexKind, IndexRef, IndexWrite, JsonMap, Record, Response, Result, Transport,
    TrellisError,
};

use crate::record::{class_segment, RexsterResponse};

/// Namespace the bundled scripts are registered under
pub const SCRIPT_NAMESPACE: &str = "gremlin";

const GREMLIN_SCRIPTS: &str = include_str!("gremlin.groovy");

/// Which server sits behind the Rexster encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Rexster,
    Titan,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rexster => "rexster",
            Self::Titan => "titan",
        }
    }
}

/// Client for the Rexster REST API
pub struct RexsterClient {
    context: ClientContext,
    transport: Box<dyn Transport>,
    flavor: Flavor,
}

impl fmt::Debug for RexsterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RexsterClient")
            .field("flavor", &self.flavor)
            .field("root", &self.context.config().root())
            .finish()
    }
}

/// Query values carry their type, e.g. `(integer,5)`; strings go bare
pub fn typed_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => format!("(boolean,{b})"),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => format!("(integer,{i})"),
            Some(i) => format!("(long,{i})"),
            None => format!("(double,{n})"),
        },
        other => other.to_string(),
    }
}

fn strip_nulls(data: &JsonMap) -> JsonMap {
    data.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn edges_segment(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "outE",
        Direction::In => "inE",
        Direction::Both => "bothE",
    }
}

fn vertices_segment(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "out",
        Direction::In => "in",
        Direction::Both => "both",
    }
}

fn index_type(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Automatic => "automatic",
        IndexKind::Exact | IndexKind::Unique => "manual",
    }
}

impl RexsterClient {
    /// Connect to a Rexster graph over HTTP
    pub fn new(config: Config) -> Result<Self> {
        Self::connect(config, Flavor::Rexster)
    }

    /// Connect to a Titan graph served by Rexster
    pub fn titan(config: Config) -> Result<Self> {
        Self::connect(config, Flavor::Titan)
    }

    fn connect(config: Config, flavor: Flavor) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, flavor, Box::new(transport))
    }

    /// Use a custom transport
    pub fn with_transport(
        config: Config,
        flavor: Flavor,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let context = ClientContext::new(config);
        register_scripts(&context, SCRIPT_NAMESPACE, GREMLIN_SCRIPTS)?;
        Ok(Self {
            context,
            transport,
            flavor,
        })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub(crate) fn send(&self, request: HttpRequest) -> Result<RexsterResponse> {
        let method = request.method;
        let path = request.path();
        let response = self.transport.send(request)?;
        tracing::debug!("{} {} {} -> {}", self.flavor.as_str(), method, path, response.status);
        handle_response(response.status, &response.body)?;
        RexsterResponse::from_http(response, self.config().root())
    }

    pub(crate) fn synthetic(&self, results: JsonValue) -> Box<dyn Response> {
        Box::new(RexsterResponse::synthetic(results, self.config().root()))
    }

    fn element_path(base: BaseType, id: &ElementId) -> [String; 2] {
        [class_segment(base).to_string(), id.to_string()]
    }

    /// Current data of an element about to be updated under an index
    fn previous_data(
        &self,
        base: BaseType,
        id: &ElementId,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Option<JsonMap>> {
        if index.is_none() || self.flavor == Flavor::Titan {
            return Ok(None);
        }
        let response = self.send(HttpRequest::get(Self::element_path(base, id)))?;
        Ok(response.one()?.map(|record| record.data()))
    }

    /// Index an element just written, per the caller's index target
    fn index_written(
        &self,
        base: BaseType,
        response: &dyn Response,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
        previous: Option<&JsonMap>,
    ) -> Result<()> {
        let Some(write) = index else {
            return Ok(());
        };
        if self.flavor == Flavor::Titan {
            // key indices follow the element write on the server
            return Ok(());
        }
        let id = response
            .one()?
            .and_then(|record| record.id())
            .ok_or_else(|| TrellisError::Decode(format!("rexster returned no {base} to index")))?;
        let target = index_for_write(self, base, write.name);
        write_index_entries(self, &target, &id, data, write.keys, previous.is_some(), previous)
    }

    fn update_element(
        &self,
        base: BaseType,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let previous = self.previous_data(base, id, index)?;
        let data = strip_nulls(data);
        let request =
            HttpRequest::put(Self::element_path(base, id)).json(JsonValue::Object(data.clone()));
        let response = self.send(request)?;
        self.index_written(base, &response, &data, index, previous.as_ref())?;
        Ok(Box::new(response))
    }

    fn with_entry(request: HttpRequest, key: &str, value: &JsonValue) -> HttpRequest {
        request.param("key", key).param("value", typed_value(value))
    }

    fn ensure_manual(&self, index: &IndexRef) -> Result<()> {
        if index.kind == IndexKind::Automatic {
            return Err(TrellisError::ReadOnly(format!("{} is automatic", index.name)));
        }
        Ok(())
    }
}

impl Client for RexsterClient {
    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn backend(&self) -> &str {
        self.flavor.as_str()
    }

    fn create_vertex(
        &self,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        let data = strip_nulls(data);
        let request = HttpRequest::post(["vertices"]).json(JsonValue::Object(data.clone()));
        let response = self.send(request)?;
        self.index_written(BaseType::Vertex, &response, &data, index, None)?;
        Ok(Box::new(response))
    }

    fn get_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::get(Self::element_path(BaseType::Vertex, id)))?))
    }

    fn update_vertex(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        self.update_element(BaseType::Vertex, id, data, index)
    }

    /// The server removes the vertex's edges along with it
    fn delete_vertex(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::delete(Self::element_path(BaseType::Vertex, id)))?))
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
        let mut body = data.clone();
        body.insert("_outV".to_string(), out_v.to_json());
        body.insert("_label".to_string(), json!(label));
        body.insert("_inV".to_string(), in_v.to_json());
        let response = self.send(HttpRequest::post(["edges"]).json(JsonValue::Object(body)))?;
        self.index_written(BaseType::Edge, &response, &data, index, None)?;
        Ok(Box::new(response))
    }

    fn get_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::get(Self::element_path(BaseType::Edge, id)))?))
    }

    fn update_edge(
        &self,
        id: &ElementId,
        data: &JsonMap,
        index: Option<IndexWrite<'_>>,
    ) -> Result<Box<dyn Response>> {
        self.update_element(BaseType::Edge, id, data, index)
    }

    fn delete_edge(&self, id: &ElementId) -> Result<Box<dyn Response>> {
        Ok(Box::new(self.send(HttpRequest::delete(Self::element_path(BaseType::Edge, id)))?))
    }

    fn vertex_edges(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let mut request = HttpRequest::get([
            "vertices".to_string(),
            id.to_string(),
            edges_segment(direction).to_string(),
        ]);
        if let Some(label) = label {
            request = request.param("_label", label);
        }
        Ok(Box::new(self.send(request)?))
    }

    fn adjacent_vertices(
        &self,
        id: &ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Box<dyn Response>> {
        let mut request = HttpRequest::get([
            "vertices".to_string(),
            id.to_string(),
            vertices_segment(direction).to_string(),
        ]);
        if let Some(label) = label {
            request = request.param("_label", label);
        }
        Ok(Box::new(self.send(request)?))
    }

    fn create_index(&self, index: &IndexRef) -> Result<Box<dyn Response>> {
        if self.flavor == Flavor::Titan {
            return self.titan_create_index(index);
        }
        let request = HttpRequest::post(["indices", index.name.as_str()])
            .param("class", index.base.as_str())
            .param("type", index_type(index.kind));
        let response = self.send(request)?;
        tracing::info!("Created rexster {} index '{}'", index.base, index.name);
        Ok(Box::new(response))
    }

    /// Rexster has no per-index metadata route; reads the listing
    fn get_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        if self.flavor == Flavor::Titan {
            return Ok(self.titan_index(base, name));
        }
        let listing = self.send(HttpRequest::get(["indices"]))?;
        let found = listing
            .content()
            .and_then(|content| content.get("results"))
            .and_then(JsonValue::as_array)
            .and_then(|indices| {
                indices
                    .iter()
                    .find(|info| info.get("name").and_then(JsonValue::as_str) == Some(name))
            })
            .cloned();
        match found {
            Some(info) => Ok(self.synthetic(info)),
            None => Err(TrellisError::NotFound(format!("{base} index '{name}'"))),
        }
    }

    fn delete_index(&self, base: BaseType, name: &str) -> Result<Box<dyn Response>> {
        if self.flavor == Flavor::Titan {
            return Err(TrellisError::Unsupported(format!(
                "titan {base} key indices cannot be dropped by name"
            )));
        }
        Ok(Box::new(self.send(HttpRequest::delete(["indices", name]))?))
    }

    fn put_index_entry(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
        id: &ElementId,
    ) -> Result<Box<dyn Response>> {
        self.ensure_manual(index)?;
        let request = HttpRequest::put(["indices", index.name.as_str()]);
        let request = Self::with_entry(request, key, value).param("id", id.to_string());
        Ok(Box::new(self.send(request)?))
    }

    fn lookup_index(
        &self,
        index: &IndexRef,
        key: &str,
        value: &JsonValue,
    ) -> Result<Box<dyn Response>> {
        if self.flavor == Flavor::Titan {
            return self.titan_lookup(index.base, key, value);
        }
        let request = HttpRequest::get(["indices", index.name.as_str()]);
        let request = Self::with_entry(request, key, value);
        Ok(Box::new(self.send(request)?))
    }

    /// Rexster removes one exact entry at a time
    fn remove_index_entry(
        &self,
        index: &IndexRef,
        id: &ElementId,
        key: Option<&str>,
        value: Option<&JsonValue>,
    ) -> Result<Box<dyn Response>> {
        self.ensure_manual(index)?;
        let (Some(key), Some(value)) = (key, value) else {
            return Err(TrellisError::InvalidInput(format!(
                "removing from '{}' needs both key and value",
                index.name
            )));
        };
        let request = HttpRequest::delete(["indices", index.name.as_str()]);
        let request = Self::with_entry(request, key, value).param("id", id.to_string());
        Ok(Box::new(self.send(request)?))
    }

    fn count_index(&self, index: &IndexRef, key: &str, value: &JsonValue) -> Result<u64> {
        if self.flavor == Flavor::Titan {
            return Ok(self.titan_lookup(index.base, key, value)?.total_size() as u64);
        }
        let request = HttpRequest::get(["indices", index.name.as_str(), "count"]);
        let request = Self::with_entry(request, key, value);
        let response = self.send(request)?;
        response
            .reported_total()
            .ok_or_else(|| TrellisError::Decode(format!("no totalSize counting '{}'", index.name)))
    }

    fn gremlin(&self, script: &str, params: &JsonMap) -> Result<Box<dyn Response>> {
        let request =
            HttpRequest::post(["tp", "gremlin"]).json(json!({"script": script, "params": params}));
        Ok(Box::new(self.send(request)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_values() {
        assert_eq!(typed_value(&json!("James")), "James");
        assert_eq!(typed_value(&json!(5)), "(integer,5)");
        assert_eq!(typed_value(&json!(5_000_000_000_i64)), "(long,5000000000)");
        assert_eq!(typed_value(&json!(1.5)), "(double,1.5)");
        assert_eq!(typed_value(&json!(true)), "(boolean,true)");
    }

    #[test]
    fn test_index_types() {
        assert_eq!(index_type(IndexKind::Exact), "manual");
        assert_eq!(index_type(IndexKind::Unique), "manual");
        assert_eq!(index_type(IndexKind::Automatic), "automatic");
    }
}
