//! Bidirectional value conversion between host values and wire values
//!
//! A [`TypeSystem`] pairs a [`DatabaseConverter`] (host to wire) with a
//! [`HostConverter`] (wire to host). Property definitions call through
//! these so the same schema works against any backend encoding.
//!
//! Date/time values travel as integer UTC epoch seconds.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use crate::error::{Result, TrellisError};
use crate::value::{JsonMap, PropertyMap, Value};

/// Host to wire conversion
pub trait DatabaseConverter: Send + Sync {
    fn to_string(&self, value: &Value) -> Result<JsonValue>;
    fn to_integer(&self, value: &Value) -> Result<JsonValue>;
    fn to_long(&self, value: &Value) -> Result<JsonValue>;
    fn to_float(&self, value: &Value) -> Result<JsonValue>;
    fn to_list(&self, value: &Value) -> Result<JsonValue>;
    fn to_dictionary(&self, value: &Value) -> Result<JsonValue>;
    fn to_null(&self, value: &Value) -> Result<JsonValue>;
    /// Backend-specific extension point for dates and date/times
    fn to_datetime(&self, value: &Value) -> Result<JsonValue>;

    /// Convert a value of any host type, dispatching on the value itself
    fn to_db(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Null => self.to_null(value),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::String(_) => self.to_string(value),
            Value::Integer(_) => self.to_integer(value),
            Value::Long(_) => self.to_long(value),
            Value::Float(_) => self.to_float(value),
            Value::List(_) => self.to_list(value),
            Value::Dictionary(_) => self.to_dictionary(value),
            Value::DateTime(_) | Value::Date(_) => self.to_datetime(value),
        }
    }

    /// Convert a whole property map
    fn to_db_map(&self, data: &PropertyMap) -> Result<JsonMap> {
        data.iter()
            .map(|(key, value)| Ok((key.clone(), self.to_db(value)?)))
            .collect()
    }
}

/// Wire to host conversion
pub trait HostConverter: Send + Sync {
    fn to_string(&self, value: &JsonValue) -> Result<Value>;
    fn to_integer(&self, value: &JsonValue) -> Result<Value>;
    fn to_long(&self, value: &JsonValue) -> Result<Value>;
    fn to_float(&self, value: &JsonValue) -> Result<Value>;
    fn to_list(&self, value: &JsonValue) -> Result<Value>;
    fn to_dictionary(&self, value: &JsonValue) -> Result<Value>;
    fn to_null(&self, value: &JsonValue) -> Result<Value>;
    /// Backend-specific extension point for dates and date/times
    fn to_datetime(&self, value: &JsonValue) -> Result<Value>;

    /// Convert an untyped wire value using the shape of the value itself
    fn to_host(&self, value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i).map_or(Value::Long(i), Value::Integer),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::Array(items) => Value::List(items.iter().map(|v| self.to_host(v)).collect()),
            JsonValue::Object(map) => Value::Dictionary(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.to_host(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a whole wire map
    fn to_host_map(&self, data: &JsonMap) -> PropertyMap {
        data.iter()
            .map(|(key, value)| (key.clone(), self.to_host(value)))
            .collect()
    }
}

/// A converter pair for one wire encoding
pub trait TypeSystem: Send + Sync {
    fn name(&self) -> &str;
    fn database(&self) -> &dyn DatabaseConverter;
    fn host(&self) -> &dyn HostConverter;
}

/// JSON wire encoding used by every REST backend
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTypeSystem {
    database: JsonDatabaseConverter,
    host: JsonHostConverter,
}

impl JsonTypeSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeSystem for JsonTypeSystem {
    fn name(&self) -> &str {
        "json"
    }

    fn database(&self) -> &dyn DatabaseConverter {
        &self.database
    }

    fn host(&self) -> &dyn HostConverter {
        &self.host
    }
}

fn write_mismatch(expected: &str, value: &Value) -> TrellisError {
    TrellisError::type_mismatch("<value>", expected, value.type_name())
}

fn read_mismatch(expected: &str, value: &JsonValue) -> TrellisError {
    TrellisError::Decode(format!("expected {expected}, got {value}"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDatabaseConverter;

impl DatabaseConverter for JsonDatabaseConverter {
    fn to_string(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::String(s) => Ok(JsonValue::String(s.clone())),
            _ => Err(write_mismatch("string", value)),
        }
    }

    fn to_integer(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Integer(i) => Ok(JsonValue::from(*i)),
            _ => Err(write_mismatch("integer", value)),
        }
    }

    fn to_long(&self, value: &Value) -> Result<JsonValue> {
        value
            .as_i64()
            .map(JsonValue::from)
            .ok_or_else(|| write_mismatch("long", value))
    }

    fn to_float(&self, value: &Value) -> Result<JsonValue> {
        let x = value.as_f64().ok_or_else(|| write_mismatch("float", value))?;
        serde_json::Number::from_f64(x)
            .map(JsonValue::Number)
            .ok_or_else(|| TrellisError::InvalidInput(format!("{x} has no JSON representation")))
    }

    fn to_list(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::List(items) => Ok(JsonValue::Array(
                items.iter().map(|v| self.to_db(v)).collect::<Result<_>>()?,
            )),
            _ => Err(write_mismatch("list", value)),
        }
    }

    fn to_dictionary(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Dictionary(map) => Ok(JsonValue::Object(self.to_db_map(map)?)),
            _ => Err(write_mismatch("dictionary", value)),
        }
    }

    fn to_null(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            _ => Err(write_mismatch("null", value)),
        }
    }

    fn to_datetime(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::DateTime(dt) => Ok(JsonValue::from(dt.timestamp())),
            Value::Date(d) => Ok(JsonValue::from(
                d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp(),
            )),
            _ => Err(write_mismatch("datetime", value)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHostConverter;

impl HostConverter for JsonHostConverter {
    fn to_string(&self, value: &JsonValue) -> Result<Value> {
        match value {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Number(n) => Ok(Value::String(n.to_string())),
            JsonValue::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(read_mismatch("string", value)),
        }
    }

    fn to_integer(&self, value: &JsonValue) -> Result<Value> {
        let n = json_i64(value).ok_or_else(|| read_mismatch("integer", value))?;
        i32::try_from(n)
            .map(Value::Integer)
            .map_err(|_| read_mismatch("integer", value))
    }

    fn to_long(&self, value: &JsonValue) -> Result<Value> {
        json_i64(value)
            .map(Value::Long)
            .ok_or_else(|| read_mismatch("long", value))
    }

    fn to_float(&self, value: &JsonValue) -> Result<Value> {
        match value {
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| read_mismatch("float", value)),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| read_mismatch("float", value)),
            _ => Err(read_mismatch("float", value)),
        }
    }

    fn to_list(&self, value: &JsonValue) -> Result<Value> {
        match value {
            JsonValue::Array(items) => {
                Ok(Value::List(items.iter().map(|v| self.to_host(v)).collect()))
            }
            _ => Err(read_mismatch("list", value)),
        }
    }

    fn to_dictionary(&self, value: &JsonValue) -> Result<Value> {
        match value {
            JsonValue::Object(map) => Ok(Value::Dictionary(self.to_host_map(map))),
            _ => Err(read_mismatch("dictionary", value)),
        }
    }

    fn to_null(&self, value: &JsonValue) -> Result<Value> {
        match value {
            JsonValue::Null => Ok(Value::Null),
            _ => Err(read_mismatch("null", value)),
        }
    }

    fn to_datetime(&self, value: &JsonValue) -> Result<Value> {
        let parsed = match value {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        };
        parsed
            .map(Value::DateTime)
            .ok_or_else(|| read_mismatch("datetime", value))
    }
}

fn json_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Date at UTC midnight reconstructed from a wire timestamp
pub(crate) fn date_from_datetime(value: Value) -> Option<NaiveDate> {
    value.as_datetime().map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use proptest::prelude::*;

    fn ts() -> JsonTypeSystem {
        JsonTypeSystem::new()
    }

    fn round_trip(value: &Value) -> Value {
        let ts = ts();
        let wire = ts.database().to_db(value).unwrap();
        ts.host().to_host(&wire)
    }

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i32>().prop_map(Value::Integer),
            (-1.0e12f64..1.0e12f64).prop_map(Value::Float),
            ".*".prop_map(Value::String),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(Value::Dictionary),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_untyped_round_trip(value in arb_value()) {
            prop_assert_eq!(round_trip(&value), value);
        }

        #[test]
        fn prop_long_round_trip(n in any::<i64>()) {
            let ts = ts();
            let wire = ts.database().to_long(&Value::Long(n)).unwrap();
            prop_assert_eq!(ts.host().to_long(&wire).unwrap(), Value::Long(n));
        }

        #[test]
        fn prop_datetime_truncates_to_seconds(
            secs in -2_000_000_000i64..4_000_000_000i64,
            nanos in 0u32..1_000_000_000u32,
        ) {
            let ts = ts();
            let dt = Utc.timestamp_opt(secs, nanos).unwrap();
            let wire = ts.database().to_datetime(&Value::DateTime(dt)).unwrap();
            let back = ts.host().to_datetime(&wire).unwrap();
            prop_assert_eq!(back, Value::DateTime(dt.with_nanosecond(0).unwrap()));
        }
    }

    #[test]
    fn test_datetime_wire_is_epoch_seconds() {
        let dt = Utc.with_ymd_and_hms(2012, 7, 4, 12, 30, 15).unwrap();
        let wire = ts().database().to_db(&Value::DateTime(dt)).unwrap();
        assert_eq!(wire, JsonValue::from(1341405015i64));
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        let ts = ts();
        let wire = ts.database().to_db(&Value::Date(date)).unwrap();
        let back = ts.host().to_datetime(&wire).unwrap();
        assert_eq!(date_from_datetime(back), Some(date));
    }

    #[test]
    fn test_integer_rejects_overflow_on_read() {
        let wire = JsonValue::from(i64::from(i32::MAX) + 1);
        assert!(ts().host().to_integer(&wire).is_err());
        assert_eq!(
            ts().host().to_long(&wire).unwrap(),
            Value::Long(i64::from(i32::MAX) + 1)
        );
    }

    #[test]
    fn test_write_path_is_strict() {
        let err = ts().database().to_integer(&Value::from("five")).unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
    }

    #[test]
    fn test_untyped_large_numbers_become_long() {
        let value = ts().host().to_host(&JsonValue::from(10_000_000_000i64));
        assert_eq!(value, Value::Long(10_000_000_000));
    }
}
