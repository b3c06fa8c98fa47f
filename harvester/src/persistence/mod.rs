//! Persistence boundary.
//!
//! The harvester never talks to a store directly. It needs three things from
//! the outside world:
//!
//! - [`Model`] - the target type of harvested records: which attribute names
//!   it has, and how to make a fresh instance
//! - [`ModelInstance`] - an attribute-settable object with a commit step
//! - [`RelatedModel`] - lookup-or-create support for relational fields, keyed
//!   by a designated unique attribute
//!
//! [`MemoryModel`] implements all three in memory.

mod memory;

pub use memory::MemoryModel;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PersistResult;

/// The persistence target of a schema.
pub trait Model: Send + Sync {
    /// Name used in messages.
    fn name(&self) -> &str;

    /// Whether records of this model carry an attribute called `attribute`.
    fn has_attribute(&self, attribute: &str) -> bool;

    /// A fresh, unsaved instance.
    fn instantiate(&self) -> Box<dyn ModelInstance>;
}

/// One record on its way into the store.
pub trait ModelInstance {
    fn set_attribute(&mut self, attribute: &str, value: Value);

    /// Commit the assigned attributes, returning the persisted record.
    fn commit(&mut self) -> PersistResult<Value>;

    /// Attach a related entity to a many-valued attribute. Called after
    /// [`commit`](Self::commit).
    fn associate(&mut self, attribute: &str, related: Value) -> PersistResult<()>;
}

/// The model behind a relational field.
pub trait RelatedModel: Send + Sync {
    fn name(&self) -> &str;

    /// Find an already stored entity whose `unique_field` equals `key`.
    fn lookup(&self, unique_field: &str, key: &Value) -> Option<Map<String, Value>>;

    /// Store a placeholder entity created during harvesting.
    fn save(&self, entity: &Entity) -> PersistResult<Value>;
}

/// An entity referenced by a relational field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub model: String,
    pub attributes: Map<String, Value>,
    /// Already in the store; never saved again.
    pub persisted: bool,
}

impl Entity {
    /// An entity that was found in the store.
    pub fn existing(model: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            model: model.into(),
            attributes,
            persisted: true,
        }
    }

    /// A new entity carrying only its unique attribute.
    pub fn placeholder(model: impl Into<String>, unique_field: &str, key: Value) -> Self {
        let mut attributes = Map::new();
        attributes.insert(unique_field.to_string(), key);
        Self {
            model: model.into(),
            attributes,
            persisted: false,
        }
    }

    /// Whether this is the entity of `model` identified by `key`.
    pub fn matches(&self, model: &str, unique_field: &str, key: &Value) -> bool {
        self.model == model && self.attributes.get(unique_field) == Some(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}
