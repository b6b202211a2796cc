//! Canonical views of backend payloads
//!
//! Every backend parses its wire payloads into [`Record`]s (one raw
//! vertex, edge or index) and [`Response`]s (one call outcome). Nothing
//! outside a backend adapter inspects raw payloads, so the rest of the
//! crate never branches on which backend produced the data.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TrellisError};
use crate::index::IndexKind;
use crate::value::{BaseType, ElementId, JsonMap};

/// Canonical accessor contract over one raw backend record
pub trait Record: fmt::Debug + Send + Sync {
    /// The raw payload this record was parsed from
    fn raw(&self) -> &JsonValue;

    fn id(&self) -> Option<ElementId>;

    /// `Vertex` or `Edge`; `None` for non-element records such as indices
    fn base_type(&self) -> Option<BaseType>;

    /// Property data with backend bookkeeping fields removed
    fn data(&self) -> JsonMap;

    /// Canonical locator of the element
    fn uri(&self) -> Option<String>;

    /// Outgoing endpoint of an edge
    fn out_v(&self) -> Option<ElementId>;

    /// Incoming endpoint of an edge
    fn in_v(&self) -> Option<ElementId>;

    /// Edge label
    fn label(&self) -> Option<String>;

    fn index_name(&self) -> Option<String>;

    /// Element class an index holds
    fn index_class(&self) -> Option<BaseType>;

    /// Consistency flavor the backend reports for an index
    fn index_kind(&self) -> Option<IndexKind> {
        None
    }
}

/// Lazily produced records plus the total count reported by the backend
pub struct Records {
    iter: Box<dyn Iterator<Item = Box<dyn Record>> + Send>,
    total: usize,
}

impl Records {
    pub fn new<I>(iter: I, total: usize) -> Self
    where
        I: Iterator<Item = Box<dyn Record>> + Send + 'static,
    {
        Self {
            iter: Box::new(iter),
            total,
        }
    }

    pub fn total_size(&self) -> usize {
        self.total
    }
}

impl Iterator for Records {
    type Item = Box<dyn Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl fmt::Debug for Records {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records").field("total", &self.total).finish()
    }
}

/// Zero, one or many records from one call
#[derive(Debug)]
pub enum Results {
    Empty,
    One(Box<dyn Record>),
    Many(Records),
}

impl Results {
    /// Build from fully parsed records
    pub fn from_records(mut records: Vec<Box<dyn Record>>) -> Self {
        match records.len() {
            0 => Self::Empty,
            1 => records.pop().map_or(Self::Empty, Self::One),
            total => Self::Many(Records::new(records.into_iter(), total)),
        }
    }

    pub fn total_size(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Many(records) => records.total_size(),
        }
    }

    /// The single record, `None` when empty, an error when more than one
    pub fn one(self) -> Result<Option<Box<dyn Record>>> {
        match self {
            Self::Empty => Ok(None),
            Self::One(record) => Ok(Some(record)),
            Self::Many(mut records) => match records.total_size() {
                0 => Ok(None),
                1 => Ok(records.next()),
                count => Err(TrellisError::Multiplicity { count }),
            },
        }
    }
}

impl IntoIterator for Results {
    type Item = Box<dyn Record>;
    type IntoIter = Records;

    fn into_iter(self) -> Records {
        match self {
            Self::Empty => Records::new(std::iter::empty(), 0),
            Self::One(record) => Records::new(std::iter::once(record), 1),
            Self::Many(records) => records,
        }
    }
}

/// Canonical view of one backend call outcome
pub trait Response: fmt::Debug + Send {
    fn status(&self) -> u16;

    fn headers(&self) -> &BTreeMap<String, String>;

    /// Parsed body, `None` for an empty body
    fn content(&self) -> Option<&JsonValue>;

    fn results(&self) -> Results;

    fn total_size(&self) -> usize {
        self.results().total_size()
    }

    /// The single result of this call
    ///
    /// `None` when there were no results, [`TrellisError::Multiplicity`]
    /// when there was more than one.
    fn one(&self) -> Result<Option<Box<dyn Record>>> {
        self.results().one()
    }
}

/// Map a transport status onto success or the matching failure
pub fn handle_response(status: u16, body: &str) -> Result<()> {
    let message = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            error_message(trimmed)
        }
    };
    match status {
        200 | 201 | 204 => Ok(()),
        400 => Err(TrellisError::InvalidInput(message())),
        404 => Err(TrellisError::NotFound(message())),
        _ => Err(TrellisError::Backend {
            status,
            message: message(),
        }),
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) => ["message", "error", "exception"]
            .iter()
            .find_map(|key| map.get(*key).and_then(JsonValue::as_str))
            .map_or_else(|| body.to_string(), str::to_string),
        _ => body.to_string(),
    }
}

/// Parse a response body, treating an empty body as no content
pub fn parse_content(body: &str) -> Result<Option<JsonValue>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Fixed(JsonValue);

    impl Record for Fixed {
        fn raw(&self) -> &JsonValue {
            &self.0
        }
        fn id(&self) -> Option<ElementId> {
            self.0.get("id").and_then(ElementId::from_json)
        }
        fn base_type(&self) -> Option<BaseType> {
            Some(BaseType::Vertex)
        }
        fn data(&self) -> JsonMap {
            JsonMap::new()
        }
        fn uri(&self) -> Option<String> {
            None
        }
        fn out_v(&self) -> Option<ElementId> {
            None
        }
        fn in_v(&self) -> Option<ElementId> {
            None
        }
        fn label(&self) -> Option<String> {
            None
        }
        fn index_name(&self) -> Option<String> {
            None
        }
        fn index_class(&self) -> Option<BaseType> {
            None
        }
    }

    fn records(n: i64) -> Vec<Box<dyn Record>> {
        (0..n)
            .map(|i| Box::new(Fixed(json!({ "id": i }))) as Box<dyn Record>)
            .collect()
    }

    #[test]
    fn test_one_empty() {
        assert!(Results::from_records(records(0)).one().unwrap().is_none());
    }

    #[test]
    fn test_one_single() {
        let one = Results::from_records(records(1)).one().unwrap().unwrap();
        assert_eq!(one.id(), Some(ElementId::Int(0)));
    }

    #[test]
    fn test_one_many_is_multiplicity_error() {
        let err = Results::from_records(records(3)).one().unwrap_err();
        assert!(matches!(err, TrellisError::Multiplicity { count: 3 }));
    }

    #[test]
    fn test_into_iter_yields_all() {
        let results = Results::from_records(records(4));
        assert_eq!(results.total_size(), 4);
        assert_eq!(results.into_iter().count(), 4);
    }

    #[test]
    fn test_handle_response_status_table() {
        assert!(handle_response(200, "").is_ok());
        assert!(handle_response(201, "{}").is_ok());
        assert!(handle_response(204, "").is_ok());
        assert!(matches!(
            handle_response(400, ""),
            Err(TrellisError::InvalidInput(_))
        ));
        assert!(matches!(
            handle_response(404, r#"{"message": "Cannot find node with id [7]"}"#),
            Err(TrellisError::NotFound(ref m)) if m == "Cannot find node with id [7]"
        ));
        for status in [405, 409, 500] {
            assert!(matches!(
                handle_response(status, "boom"),
                Err(TrellisError::Backend { status: s, .. }) if s == status
            ));
        }
    }

    #[test]
    fn test_parse_content() {
        assert!(parse_content("  ").unwrap().is_none());
        assert_eq!(parse_content("[1]").unwrap(), Some(json!([1])));
        assert!(parse_content("{oops").is_err());
    }
}
