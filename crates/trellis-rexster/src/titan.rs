//! Titan key indices
//!
//! Titan has no named manual indices. Properties are indexed per key under
//! `/keyindices/{vertex|edge}/{key}` and looked up with
//! `/vertices?key=..&value=..`. Any index name resolves to an automatic
//! index over the element class, so index-on-write is left to the server.

use serde_json::{json, Value as JsonValue};

use trellis_core::{BaseType, HttpRequest, IndexKind, IndexRef, Response, Result, TrellisError};

use crate::client::{typed_value, RexsterClient};
use crate::record::class_segment;

impl RexsterClient {
    /// Index descriptor standing in for a named index
    pub(crate) fn titan_index(&self, base: BaseType, name: &str) -> Box<dyn Response> {
        self.synthetic(json!({
            "name": name,
            "class": base.as_str(),
            "type": IndexKind::Automatic.as_str(),
        }))
    }

    pub(crate) fn titan_create_index(&self, index: &IndexRef) -> Result<Box<dyn Response>> {
        if index.kind != IndexKind::Automatic {
            return Err(TrellisError::Unsupported(format!(
                "titan has no {} indices; create a key index instead",
                index.kind
            )));
        }
        Ok(self.titan_index(index.base, &index.name))
    }

    pub(crate) fn titan_lookup(
        &self,
        base: BaseType,
        key: &str,
        value: &JsonValue,
    ) -> Result<Box<dyn Response>> {
        let request = HttpRequest::get([class_segment(base)])
            .param("key", key)
            .param("value", typed_value(value));
        Ok(Box::new(self.send(request)?))
    }

    /// Index a property key for one element class
    pub fn create_key_index(&self, base: BaseType, key: &str) -> Result<()> {
        self.send(HttpRequest::post(["keyindices", base.as_str(), key]))?;
        tracing::info!("Created titan {} key index '{}'", base, key);
        Ok(())
    }

    /// Keys currently indexed for one element class
    pub fn key_indices(&self, base: BaseType) -> Result<Vec<String>> {
        let response = self.send(HttpRequest::get(["keyindices", base.as_str()]))?;
        let keys = response
            .content()
            .and_then(|content| content.get("results"))
            .and_then(JsonValue::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(keys)
    }

    pub fn drop_key_index(&self, base: BaseType, key: &str) -> Result<()> {
        self.send(HttpRequest::delete(["keyindices", base.as_str(), key]))?;
        tracing::info!("Dropped titan {} key index '{}'", base, key);
        Ok(())
    }
}
