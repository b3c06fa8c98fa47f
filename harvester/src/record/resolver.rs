//! Lazy per-field resolution.

use serde_json::Value;
use std::sync::Arc;

use super::Record;
use crate::error::{ConfigurationError, HarvestResult};
use crate::fields::{DefaultsOrder, Field, FieldKind};
use crate::schema::Schema;

impl Record {
    /// The resolved value of a field.
    ///
    /// The first call runs the field's pipeline and memoizes the result:
    /// raw cells, filters, clean hook, then validation and coercion. A field
    /// that is reached again while it is still resolving is a cyclical
    /// dependency. Failed resolutions are not memoized.
    pub fn get(&mut self, name: &str) -> HarvestResult<Value> {
        if let Some(value) = self.clean.get(name) {
            return Ok(value.clone());
        }

        let schema = Arc::clone(&self.schema);
        let field = schema.require_field(name)?;
        if !self.resolving.insert(name.to_string()) {
            return Err(ConfigurationError::CyclicDependency {
                schema: schema.name().to_string(),
                field: name.to_string(),
            }
            .into());
        }

        let result = self.resolve(&schema, field);
        self.resolving.remove(name);

        let value = result?;
        self.clean.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn resolve(&mut self, schema: &Schema, field: &Field) -> HarvestResult<Value> {
        let raw = self.raw.get(field.name()).cloned().unwrap_or_default();
        let mut value = if field.is_single_column() {
            raw.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(raw)
        };

        let filters = schema.filters_for(field);
        if field.defaults_order() == DefaultsOrder::First {
            value = filters.apply(value);
        }
        if let Some(hook) = schema.hook(field.name()) {
            value = hook(self, value)?;
        }
        if field.defaults_order() == DefaultsOrder::Last {
            value = filters.apply(value);
        }

        let value = field.clean(value)?;
        Ok(self.relate(field, value))
    }

    /// Swap relational keys for the entities they identify.
    fn relate(&mut self, field: &Field, value: Value) -> Value {
        let mut entities = self.entities.borrow_mut();
        match (field.kind(), value) {
            (_, Value::Null) => Value::Null,
            (FieldKind::ForeignKey(relation), key) if !key.is_object() => {
                entities.resolve(relation, key)
            }
            (FieldKind::ManyToMany(relation), Value::Array(keys)) => Value::Array(
                keys.into_iter()
                    .map(|key| {
                        if key.is_object() {
                            key
                        } else {
                            entities.resolve(relation, key)
                        }
                    })
                    .collect(),
            ),
            (_, value) => value,
        }
    }
}
