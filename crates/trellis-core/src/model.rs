//! Schema-carrying elements
//!
//! A [`Model`] wraps a plain [`Vertex`] or [`Edge`] and adds the declared
//! properties of its [`Schema`]. Declared values live in their own map;
//! anything else goes to the wrapped element's free-form properties.
//!
//! Writes go through a fixed pipeline:
//! 1. defaults fill declared properties the caller left out
//! 2. caller input overrides defaults
//! 3. every declared value is coerced and validated
//! 4. the data is encoded for the wire and submitted with its index target
//! 5. the returned record is materialized back into the model

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::client::{Client, IndexWrite};
use crate::element::{Edge, ElementCore, GraphElement, Vertex};
use crate::error::{Result, TrellisError};
use crate::record::Record;
use crate::schema::Schema;
use crate::value::{BaseType, JsonMap, PropertyMap, Value};

/// An element with declared properties
#[derive(Debug, Clone)]
pub struct Model<E> {
    element: E,
    schema: Arc<Schema>,
    declared: PropertyMap,
}

/// A vertex with declared properties
pub type Node = Model<Vertex>;

/// An edge with declared properties
pub type Relationship = Model<Edge>;

impl<E: GraphElement> Model<E> {
    /// Materialize a record through `schema`
    pub(crate) fn initialize(
        client: &Arc<dyn Client>,
        record: &dyn Record,
        schema: Arc<Schema>,
    ) -> Result<Self> {
        let base = record.base_type();
        if base != Some(E::BASE) || schema.base() != E::BASE {
            return Err(TrellisError::WrongElementType {
                expected: format!("{} '{}'", E::BASE, schema.element_type()),
                found: base.map_or_else(|| "non-element".to_string(), |b| b.to_string()),
            });
        }

        let mut data = record.data();
        if E::BASE == BaseType::Vertex {
            data.remove(&client.config().type_var);
        }

        let ts = client.type_system();
        let mut declared = PropertyMap::new();
        for property in schema.properties() {
            let wire = data.remove(property.name());
            if property.is_calculated() {
                continue;
            }
            let value = wire.map_or(Value::Null, |v| {
                property.convert_to_host(ts, property.name(), &v)
            });
            declared.insert(property.name().to_string(), value);
        }

        let core =
            ElementCore::from_record(client, record, schema.element_type().to_string(), &data)?;
        Ok(Self {
            element: E::from_core(core),
            schema,
            declared,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The wrapped plain element
    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    /// Declared stored values
    pub fn declared(&self) -> &PropertyMap {
        &self.declared
    }

    /// Declared, calculated, identity or free-form value by name
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.schema.property(key) {
            Some(property) if property.is_calculated() => property.calculate(&self.declared),
            Some(_) => self.declared.get(key).cloned(),
            None => self.element.core().get(key),
        }
    }

    /// Set a declared or free-form value; validated on save
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        match self.schema.property(&key) {
            Some(property) if property.is_calculated() => Err(TrellisError::ReadOnly(format!(
                "'{key}' is calculated on '{}'",
                self.schema.element_type()
            ))),
            Some(_) => {
                self.declared.insert(key, value.into());
                Ok(())
            }
            None => self.element.core_mut().set(key, value),
        }
    }

    /// Every value: free-form, then declared, then calculated
    pub fn data(&self) -> PropertyMap {
        let mut data = self.element.core().data().clone();
        data.extend(self.declared.clone());
        for property in self.schema.properties().iter().filter(|p| p.is_calculated()) {
            if let Some(value) = property.calculate(&self.declared) {
                data.insert(property.name().to_string(), value);
            }
        }
        data
    }

    /// Re-validate and write the current values under the element's id
    pub fn save(&mut self) -> Result<()> {
        let mut input = self.element.core().data().clone();
        input.extend(self.declared.clone());
        let (declared, extras) = prepare(&self.schema, input)?;

        let client = Arc::clone(self.element.core().client());
        let data = wire_data(client.as_ref(), &self.schema, &declared, &extras)?;
        let keys = self.schema.index_keys();
        let index = self
            .schema
            .index_name(client.config())
            .map(|name| IndexWrite::new(name, keys.as_deref()));

        let response = self.element.core().update_on_backend(&data, index)?;
        match response.one()? {
            Some(record) => {
                *self = Self::initialize(&client, record.as_ref(), Arc::clone(&self.schema))?;
            }
            None => {
                self.declared = declared;
                *self.element.core_mut().properties_mut() = extras;
            }
        }
        Ok(())
    }
}

impl<E> Deref for Model<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.element
    }
}

impl<E> DerefMut for Model<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.element
    }
}

/// Split input into coerced declared values and free-form extras
///
/// Declared properties missing from `input` take their default. Fails
/// before any network traffic when a value does not validate.
pub(crate) fn prepare(
    schema: &Schema,
    mut input: PropertyMap,
) -> Result<(PropertyMap, PropertyMap)> {
    let mut declared = PropertyMap::new();
    for property in schema.properties() {
        let name = property.name();
        if property.is_calculated() {
            if input.remove(name).is_some() {
                return Err(TrellisError::ReadOnly(format!(
                    "'{name}' is calculated on '{}'",
                    schema.element_type()
                )));
            }
            continue;
        }
        let value = input
            .remove(name)
            .or_else(|| property.default())
            .unwrap_or(Value::Null);
        declared.insert(name.to_string(), property.coerce(name, value)?);
    }
    Ok((declared, input))
}

/// Wire form of a model's data, type key included for vertices
pub(crate) fn wire_data(
    client: &dyn Client,
    schema: &Schema,
    declared: &PropertyMap,
    extras: &PropertyMap,
) -> Result<JsonMap> {
    let ts = client.type_system();
    let mut data = ts.database().to_db_map(extras)?;
    for property in schema.stored() {
        let value = declared.get(property.name()).unwrap_or(&Value::Null);
        data.insert(
            property.name().to_string(),
            property.convert_to_db(ts, property.name(), value)?,
        );
    }
    if schema.base() == BaseType::Vertex {
        data.insert(
            client.config().type_var.clone(),
            serde_json::Value::String(schema.element_type().to_string()),
        );
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Property, PropertyKind};

    fn person() -> Schema {
        Schema::vertex("person")
            .property(Property::string("name").required())
            .property(Property::integer("age"))
            .property(Property::string("status").default_value("active"))
            .property(Property::calculated("label", PropertyKind::String, |data| {
                match data.get("name") {
                    Some(Value::String(name)) => Value::String(name.to_uppercase()),
                    _ => Value::Null,
                }
            }))
            .build()
            .unwrap()
    }

    fn input(pairs: &[(&str, Value)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_prepare_applies_defaults_and_coerces() {
        let (declared, extras) = prepare(
            &person(),
            input(&[
                ("name", Value::from("James")),
                ("age", Value::from("34")),
                ("nickname", Value::from("jt")),
            ]),
        )
        .unwrap();

        assert_eq!(declared["name"], Value::from("James"));
        assert_eq!(declared["age"], Value::Integer(34));
        assert_eq!(declared["status"], Value::from("active"));
        assert!(!declared.contains_key("label"));
        assert_eq!(extras["nickname"], Value::from("jt"));
    }

    #[test]
    fn test_prepare_input_overrides_default() {
        let (declared, _) = prepare(
            &person(),
            input(&[("name", Value::from("James")), ("status", Value::from("away"))]),
        )
        .unwrap();
        assert_eq!(declared["status"], Value::from("away"));
    }

    #[test]
    fn test_prepare_rejects_missing_required() {
        let err = prepare(&person(), PropertyMap::new()).unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
    }

    #[test]
    fn test_prepare_rejects_calculated_input() {
        let err = prepare(
            &person(),
            input(&[("name", Value::from("James")), ("label", Value::from("x"))]),
        )
        .unwrap_err();
        assert!(matches!(err, TrellisError::ReadOnly(_)));
    }
}
