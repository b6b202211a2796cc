//! Rexster payload adapters
//!
//! Rexster spells identity out in underscore-prefixed fields:
//! `{"_id": 1, "_type": "vertex", "name": "James"}`, with edges adding
//! `_outV`, `_inV` and `_label`. Everything else at the top level is
//! property data. Responses wrap their payload in a `results` envelope,
//! with `totalSize` on listings.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use trellis_core::record::{parse_content, Records};
use trellis_core::{
    BaseType, ElementId, HttpResponse, IndexKind, JsonMap, Record, Response, Result, Results,
};

/// Rexster path segment for a base type
pub fn class_segment(base: BaseType) -> &'static str {
    match base {
        BaseType::Vertex => "vertices",
        BaseType::Edge => "edges",
    }
}

/// Index classes come back either as `vertex` or as a Blueprints class name
fn parse_class(raw: &str) -> Option<BaseType> {
    let short = raw.rsplit('.').next().unwrap_or(raw);
    BaseType::parse(&short.to_ascii_lowercase())
}

/// One vertex, edge or index descriptor
#[derive(Debug, Clone)]
pub struct RexsterRecord {
    raw: JsonValue,
    root: String,
}

impl RexsterRecord {
    /// `root` is the graph URI the record's locator is built from
    pub fn new(raw: JsonValue, root: impl Into<String>) -> Self {
        Self {
            raw,
            root: root.into(),
        }
    }

    fn field(&self, key: &str) -> Option<&JsonValue> {
        self.raw.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(JsonValue::as_str)
    }
}

impl Record for RexsterRecord {
    fn raw(&self) -> &JsonValue {
        &self.raw
    }

    fn id(&self) -> Option<ElementId> {
        self.field("_id").and_then(ElementId::from_json)
    }

    fn base_type(&self) -> Option<BaseType> {
        self.str_field("_type").and_then(BaseType::parse)
    }

    fn data(&self) -> JsonMap {
        match &self.raw {
            JsonValue::Object(map) => map
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            _ => JsonMap::new(),
        }
    }

    fn uri(&self) -> Option<String> {
        let base = self.base_type()?;
        let id = self.id()?;
        Some(format!("{}/{}/{}", self.root.trim_end_matches('/'), class_segment(base), id))
    }

    fn out_v(&self) -> Option<ElementId> {
        self.field("_outV").and_then(ElementId::from_json)
    }

    fn in_v(&self) -> Option<ElementId> {
        self.field("_inV").and_then(ElementId::from_json)
    }

    fn label(&self) -> Option<String> {
        self.str_field("_label").map(str::to_string)
    }

    fn index_name(&self) -> Option<String> {
        self.str_field("name").map(str::to_string)
    }

    fn index_class(&self) -> Option<BaseType> {
        self.str_field("class").and_then(parse_class)
    }

    /// Manual indices report no kind of their own
    fn index_kind(&self) -> Option<IndexKind> {
        match self.str_field("type") {
            Some("automatic") => Some(IndexKind::Automatic),
            _ => None,
        }
    }
}

/// Outcome of one Rexster call
#[derive(Debug, Clone)]
pub struct RexsterResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    content: Option<JsonValue>,
    root: String,
}

impl RexsterResponse {
    /// Parse an HTTP response that already passed status handling
    pub fn from_http(response: HttpResponse, root: impl Into<String>) -> Result<Self> {
        Ok(Self {
            status: response.status,
            content: parse_content(&response.body)?,
            headers: response.headers,
            root: root.into(),
        })
    }

    /// A response assembled client-side, wrapped like a server reply
    pub fn synthetic(results: JsonValue, root: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            content: Some(serde_json::json!({ "results": results })),
            root: root.into(),
        }
    }

    /// `totalSize` as reported by the server
    pub fn reported_total(&self) -> Option<u64> {
        self.content.as_ref()?.get("totalSize")?.as_u64()
    }

    fn boxed(&self, raw: JsonValue) -> Box<dyn Record> {
        Box::new(RexsterRecord::new(raw, self.root.clone()))
    }
}

impl Response for RexsterResponse {
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
        let results = self.content.as_ref().and_then(|content| content.get("results"));
        match results {
            Some(JsonValue::Array(items)) => match items.len() {
                0 => Results::Empty,
                1 => Results::One(self.boxed(items[0].clone())),
                total => {
                    let root = self.root.clone();
                    let records = items
                        .clone()
                        .into_iter()
                        .map(move |raw| {
                            Box::new(RexsterRecord::new(raw, root.clone())) as Box<dyn Record>
                        });
                    Results::Many(Records::new(records, total))
                }
            },
            Some(raw @ JsonValue::Object(_)) => Results::One(self.boxed(raw.clone())),
            _ => Results::Empty,
        }
    }
}
