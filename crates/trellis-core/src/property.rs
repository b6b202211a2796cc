//! Declarative property descriptors
//!
//! A [`Property`] names one declared field of a model: its kind, whether
//! it may be null, its default, and whether it is indexed. Descriptors are
//! built once per schema and shared by every instance.
//!
//! Writes are strict: `convert_to_db` validates and fails on bad input.
//! Reads are best-effort: `convert_to_host` logs a failed conversion and
//! yields `Value::Null` for that field.

use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TrellisError, ValidationError};
use crate::typesystem::{date_from_datetime, TypeSystem};
use crate::value::{PropertyMap, Value};

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Integer,
    Long,
    Float,
    List,
    Dictionary,
    /// Dictionary stored as a JSON string on the wire
    Document,
    DateTime,
    Date,
    Null,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::List => "list",
            Self::Dictionary => "dictionary",
            Self::Document => "document",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Null => "null",
        }
    }

    /// Whether a non-null host value is an instance of this kind
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Long, Value::Long(_) | Value::Integer(_))
                | (Self::Float, Value::Float(_))
                | (Self::List, Value::List(_))
                | (Self::Dictionary | Self::Document, Value::Dictionary(_))
                | (Self::DateTime, Value::DateTime(_))
                | (Self::Date, Value::Date(_))
                | (Self::Null, Value::Null)
        )
    }

    /// Best-effort conversion of a host value into this kind
    ///
    /// Values that cannot be converted are returned unchanged so that
    /// validation reports the mismatch.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Self::String, Value::Integer(i)) => Value::String(i.to_string()),
            (Self::String, Value::Long(l)) => Value::String(l.to_string()),
            (Self::String, Value::Float(f)) => Value::String(f.to_string()),
            (Self::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Integer, Value::Long(l)) => {
                i32::try_from(l).map_or(Value::Long(l), Value::Integer)
            }
            (Self::Integer, Value::String(s)) => match s.trim().parse::<i32>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::String(s),
            },
            (Self::Long, Value::Integer(i)) => Value::Long(i64::from(i)),
            (Self::Long, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(l) => Value::Long(l),
                Err(_) => Value::String(s),
            },
            (Self::Float, Value::Integer(i)) => Value::Float(f64::from(i)),
            (Self::Float, Value::Long(l)) => Value::Float(l as f64),
            (Self::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (Self::DateTime, Value::Integer(i)) => epoch(i64::from(i)),
            (Self::DateTime, Value::Long(l)) => epoch(l),
            (Self::DateTime, Value::Date(d)) => {
                Value::DateTime(d.and_time(chrono::NaiveTime::MIN).and_utc())
            }
            (Self::Date, Value::DateTime(dt)) => Value::Date(dt.date_naive()),
            (_, other) => other,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn epoch(secs: i64) -> Value {
    chrono::DateTime::from_timestamp(secs, 0).map_or(Value::Long(secs), Value::DateTime)
}

/// Accessor computing a calculated property from the declared data
pub type Accessor = Arc<dyn Fn(&PropertyMap) -> Value + Send + Sync>;

/// Default value for a property
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    /// Called once per instance when defaults are applied
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A named, typed, validated field descriptor
#[derive(Clone)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    nullable: bool,
    indexed: bool,
    default: Option<DefaultValue>,
    accessor: Option<Accessor>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("indexed", &self.indexed)
            .field("default", &self.default)
            .field("calculated", &self.accessor.is_some())
            .finish()
    }
}

impl Property {
    /// Create a nullable property of the given kind
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            indexed: false,
            default: None,
            accessor: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Integer)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Long)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Float)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::List)
    }

    pub fn dictionary(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Dictionary)
    }

    pub fn document(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Document)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::DateTime)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Date)
    }

    /// A property whose value is produced by `accessor` instead of stored
    ///
    /// Calculated properties are never sent to the backend and never
    /// overwritten by data read back from it.
    pub fn calculated<F>(name: impl Into<String>, kind: PropertyKind, accessor: F) -> Self
    where
        F: Fn(&PropertyMap) -> Value + Send + Sync + 'static,
    {
        Self {
            accessor: Some(Arc::new(accessor)),
            ..Self::new(name, kind)
        }
    }

    /// Set nullability
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Shorthand for `nullable(false)`
    pub fn required(self) -> Self {
        self.nullable(false)
    }

    /// Include this property in the index keys
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Static default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Default computed per instance, e.g. a creation timestamp
    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(f)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_calculated(&self) -> bool {
        self.accessor.is_some()
    }

    /// Default value, if one was declared
    pub fn default(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::resolve)
    }

    /// Value of a calculated property for the given declared data
    pub fn calculate(&self, data: &PropertyMap) -> Option<Value> {
        self.accessor.as_ref().map(|f| f(data))
    }

    /// Check nullability and type
    pub fn validate(&self, key: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(ValidationError::Null {
                key: key.to_string(),
            }
            .into());
        }
        if !self.kind.accepts(value) {
            return Err(TrellisError::type_mismatch(
                key,
                self.kind.as_str(),
                value.type_name(),
            ));
        }
        Ok(())
    }

    /// Coerce to this property's kind, then validate
    pub fn coerce(&self, key: &str, value: Value) -> Result<Value> {
        let value = self.kind.coerce(value);
        self.validate(key, &value)?;
        Ok(value)
    }

    /// Validate and convert a host value for the wire
    pub fn convert_to_db(
        &self,
        ts: &dyn TypeSystem,
        key: &str,
        value: &Value,
    ) -> Result<JsonValue> {
        self.validate(key, value)?;
        if value.is_null() {
            return ts.database().to_null(value);
        }
        let db = ts.database();
        let converted = match self.kind {
            PropertyKind::String => db.to_string(value),
            PropertyKind::Integer => db.to_integer(value),
            PropertyKind::Long => db.to_long(value),
            PropertyKind::Float => db.to_float(value),
            PropertyKind::List => db.to_list(value),
            PropertyKind::Dictionary => db.to_dictionary(value),
            PropertyKind::Document => {
                let encoded = serde_json::to_string(&db.to_dictionary(value)?)?;
                db.to_string(&Value::String(encoded))
            }
            PropertyKind::DateTime | PropertyKind::Date => db.to_datetime(value),
            PropertyKind::Null => db.to_null(value),
        };
        converted.map_err(|err| match err {
            TrellisError::Validation(ValidationError::TypeMismatch {
                expected, found, ..
            }) => TrellisError::type_mismatch(key, expected, found),
            other => other,
        })
    }

    /// Convert a wire value to the host kind; failures log and yield `Null`
    pub fn convert_to_host(&self, ts: &dyn TypeSystem, key: &str, value: &JsonValue) -> Value {
        match self.try_convert_to_host(ts, value) {
            Ok(converted) => converted,
            Err(err) => {
                tracing::warn!(
                    "Could not convert property '{}' ({}) from {}: {}",
                    key,
                    self.kind,
                    value,
                    err
                );
                Value::Null
            }
        }
    }

    fn try_convert_to_host(&self, ts: &dyn TypeSystem, value: &JsonValue) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let host = ts.host();
        match self.kind {
            PropertyKind::String => host.to_string(value),
            PropertyKind::Integer => host.to_integer(value),
            PropertyKind::Long => host.to_long(value),
            PropertyKind::Float => host.to_float(value),
            PropertyKind::List => host.to_list(value),
            PropertyKind::Dictionary => host.to_dictionary(value),
            PropertyKind::Document => match value {
                JsonValue::String(encoded) => {
                    let decoded: JsonValue = serde_json::from_str(encoded)?;
                    host.to_dictionary(&decoded)
                }
                other => host.to_dictionary(other),
            },
            PropertyKind::DateTime => host.to_datetime(value),
            PropertyKind::Date => {
                let dt = host.to_datetime(value)?;
                date_from_datetime(dt)
                    .map(Value::Date)
                    .ok_or_else(|| TrellisError::Decode(format!("invalid date {value}")))
            }
            PropertyKind::Null => host.to_null(value),
        }
    }
}
