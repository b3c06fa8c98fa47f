//! Related entities referenced during one batch.

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::PersistResult;
use crate::fields::Relation;
use crate::persistence::{Entity, RelatedModel};

/// Handle shared by every record of a batch.
pub type SharedEntities = Rc<RefCell<EntityBatch>>;

struct BatchEntry {
    entity: Entity,
    model: Arc<dyn RelatedModel>,
    unique_field: String,
}

/// Every related entity a batch has referenced, stored or not.
///
/// A key that is not in the store yields a placeholder entity; the same key
/// seen again later in the batch yields the same placeholder, so it is saved
/// only once.
#[derive(Default)]
pub struct EntityBatch {
    entries: Vec<BatchEntry>,
}

impl EntityBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedEntities {
        Rc::new(RefCell::new(Self::new()))
    }

    /// The entity of `relation` identified by `key`, as a value.
    pub fn resolve(&mut self, relation: &Relation, key: Value) -> Value {
        if let Some(entry) = self.find(relation.model_name(), relation.unique_field(), &key) {
            return entry.entity.to_value();
        }

        let entity = match relation.model().lookup(relation.unique_field(), &key) {
            Some(attributes) => Entity::existing(relation.model_name(), attributes),
            None => Entity::placeholder(relation.model_name(), relation.unique_field(), key),
        };
        let value = entity.to_value();
        self.entries.push(BatchEntry {
            entity,
            model: relation.shared_model(),
            unique_field: relation.unique_field().to_string(),
        });
        value
    }

    /// Latest state of an entity value handed out earlier, e.g. with the
    /// attributes the store assigned when it was saved.
    pub fn refresh(&self, relation: &Relation, value: Value) -> Value {
        let key = match value.get(relation.unique_field()) {
            Some(key) => key.clone(),
            None => return value,
        };
        self.find(relation.model_name(), relation.unique_field(), &key)
            .map(|entry| entry.entity.to_value())
            .unwrap_or(value)
    }

    /// Entities that still have to be saved.
    pub fn pending(&self) -> impl Iterator<Item = &Entity> {
        self.entries
            .iter()
            .map(|entry| &entry.entity)
            .filter(|entity| !entity.persisted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Save every pending entity through its model. Returns how many were
    /// saved.
    pub fn save_pending(&mut self) -> PersistResult<usize> {
        let mut saved = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.entity.persisted) {
            let stored = entry.model.save(&entry.entity)?;
            if let Value::Object(attributes) = stored {
                // The key must survive so later refreshes still match
                if attributes.contains_key(&entry.unique_field) {
                    entry.entity.attributes = attributes;
                }
            }
            entry.entity.persisted = true;
            saved += 1;
        }
        Ok(saved)
    }

    fn find(&self, model: &str, unique_field: &str, key: &Value) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.entity.matches(model, unique_field, key))
    }
}
