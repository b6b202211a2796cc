//! Neo4j Server payload adapters
//!
//! Neo4j encodes identity in locators: a node is
//! `{"self": ".../node/42", "data": {...}}` and a relationship adds
//! `"start"`/`"end"` node locators and its `"type"`. Index descriptors
//! carry a `"template"` such as `.../index/node/people/{key}/{value}`.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use trellis_core::record::{parse_content, Records};
use trellis_core::{
    BaseType, ElementId, HttpResponse, IndexKind, JsonMap, Record, Response, Result, Results,
};

/// Auto index names Neo4j reports for nodes and relationships
pub const NODE_AUTO_INDEX: &str = "node_auto_index";
pub const RELATIONSHIP_AUTO_INDEX: &str = "relationship_auto_index";

/// Neo4j path segment for a base type
pub fn class_segment(base: BaseType) -> &'static str {
    match base {
        BaseType::Vertex => "node",
        BaseType::Edge => "relationship",
    }
}

fn base_from_segment(segment: &str) -> Option<BaseType> {
    match segment {
        "node" => Some(BaseType::Vertex),
        "relationship" => Some(BaseType::Edge),
        _ => None,
    }
}

/// One node, relationship or index descriptor
#[derive(Debug, Clone)]
pub struct Neo4jRecord {
    raw: JsonValue,
}

impl Neo4jRecord {
    pub fn new(raw: JsonValue) -> Self {
        Self { raw }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(JsonValue::as_str)
    }

    fn locator(&self) -> Option<&str> {
        self.str_field("self")
    }

    /// Path segments of the index template below `/index/`
    fn template_segments(&self) -> Option<Vec<&str>> {
        let template = self.str_field("template")?;
        let (_, rest) = template.split_once("/index/")?;
        Some(rest.split('/').collect())
    }
}

impl Record for Neo4jRecord {
    fn raw(&self) -> &JsonValue {
        &self.raw
    }

    fn id(&self) -> Option<ElementId> {
        self.locator().and_then(ElementId::from_locator)
    }

    fn base_type(&self) -> Option<BaseType> {
        let locator = self.locator()?;
        let mut segments = locator.trim_end_matches('/').rsplit('/');
        segments.next()?;
        segments.next().and_then(base_from_segment)
    }

    fn data(&self) -> JsonMap {
        match self.raw.get("data") {
            Some(JsonValue::Object(map)) => map.clone(),
            _ => JsonMap::new(),
        }
    }

    fn uri(&self) -> Option<String> {
        self.locator().map(str::to_string)
    }

    fn out_v(&self) -> Option<ElementId> {
        self.str_field("start").and_then(ElementId::from_locator)
    }

    fn in_v(&self) -> Option<ElementId> {
        self.str_field("end").and_then(ElementId::from_locator)
    }

    fn label(&self) -> Option<String> {
        match self.base_type() {
            Some(BaseType::Edge) => self.str_field("type").map(str::to_string),
            _ => None,
        }
    }

    fn index_name(&self) -> Option<String> {
        match self.template_segments()?.as_slice() {
            ["auto", "node", ..] => Some(NODE_AUTO_INDEX.to_string()),
            ["auto", "relationship", ..] => Some(RELATIONSHIP_AUTO_INDEX.to_string()),
            [_, name, ..] => Some((*name).to_string()),
            _ => None,
        }
    }

    fn index_class(&self) -> Option<BaseType> {
        match self.template_segments()?.as_slice() {
            ["auto", class, ..] => base_from_segment(class),
            [class, ..] => base_from_segment(class),
            _ => None,
        }
    }

    fn index_kind(&self) -> Option<IndexKind> {
        let segments = self.template_segments()?;
        if segments.first() == Some(&"auto") {
            return Some(IndexKind::Automatic);
        }
        match self.str_field("type") {
            Some("exact") | None => Some(IndexKind::Exact),
            Some(_) => None,
        }
    }
}

/// Outcome of one Neo4j call
#[derive(Debug, Clone)]
pub struct Neo4jResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    content: Option<JsonValue>,
}

impl Neo4jResponse {
    /// Parse an HTTP response that already passed status handling
    pub fn from_http(response: HttpResponse) -> Result<Self> {
        Ok(Self {
            status: response.status,
            content: parse_content(&response.body)?,
            headers: response.headers,
        })
    }

    /// A response assembled client-side from already parsed payloads
    pub fn synthetic(content: JsonValue) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            content: Some(content),
        }
    }

    pub fn empty() -> Self {
        Self {
            status: 204,
            headers: BTreeMap::new(),
            content: None,
        }
    }
}

fn boxed(raw: JsonValue) -> Box<dyn Record> {
    Box::new(Neo4jRecord::new(raw))
}

impl Response for Neo4jResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    fn content(&self) -> Option<&JsonValue> {
        self.content.as_ref()
    }

    fn results(&self) -> Results {
        match &self.content {
            Some(JsonValue::Array(items)) => match items.len() {
                0 => Results::Empty,
                1 => Results::One(boxed(items[0].clone())),
                total => Results::Many(Records::new(items.clone().into_iter().map(boxed), total)),
            },
            Some(raw @ JsonValue::Object(map))
                if map.contains_key("self") || map.contains_key("template") =>
            {
                Results::One(boxed(raw.clone()))
            }
            _ => Results::Empty,
        }
    }
}
