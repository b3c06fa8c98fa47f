//! In-memory persistence target.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Entity, Model, ModelInstance, RelatedModel};
use crate::error::{PersistError, PersistResult};

/// A model whose records live in a shared in-memory table.
///
/// Clones share the same table. Saved records receive an `id` attribute
/// numbered from 1.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    name: String,
    attributes: HashSet<String>,
    rows: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl MemoryModel {
    pub fn new<I, S>(name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-populate the table, e.g. with entities a lookup should find.
    pub fn with_rows(self, rows: Vec<Map<String, Value>>) -> Self {
        for row in rows {
            self.insert(row);
        }
        self
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<Value> {
        self.table().iter().cloned().map(Value::Object).collect()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, Vec<Map<String, Value>>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, mut row: Map<String, Value>) -> Value {
        let mut table = self.table();
        let id = table.len() + 1;
        row.entry("id").or_insert_with(|| Value::from(id));
        table.push(row.clone());
        Value::Object(row)
    }
}

impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    fn instantiate(&self) -> Box<dyn ModelInstance> {
        Box::new(MemoryInstance {
            model: self.clone(),
            attributes: Map::new(),
            index: None,
        })
    }
}

impl RelatedModel for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, unique_field: &str, key: &Value) -> Option<Map<String, Value>> {
        self.table()
            .iter()
            .find(|row| row.get(unique_field) == Some(key))
            .cloned()
    }

    fn save(&self, entity: &Entity) -> PersistResult<Value> {
        Ok(self.insert(entity.attributes.clone()))
    }
}

struct MemoryInstance {
    model: MemoryModel,
    attributes: Map<String, Value>,
    /// Row position once committed.
    index: Option<usize>,
}

impl ModelInstance for MemoryInstance {
    fn set_attribute(&mut self, attribute: &str, value: Value) {
        self.attributes.insert(attribute.to_string(), value);
    }

    fn commit(&mut self) -> PersistResult<Value> {
        let saved = self.model.insert(self.attributes.clone());
        self.index = Some(self.model.len() - 1);
        Ok(saved)
    }

    fn associate(&mut self, attribute: &str, related: Value) -> PersistResult<()> {
        let index = self.index.ok_or_else(|| PersistError::AssociateFailed {
            model: self.model.name.clone(),
            attribute: attribute.to_string(),
            message: "record has not been saved".to_string(),
        })?;
        let mut table = self.model.table();
        let row = table.get_mut(index).ok_or_else(|| PersistError::AssociateFailed {
            model: self.model.name.clone(),
            attribute: attribute.to_string(),
            message: format!("row {} no longer exists", index),
        })?;
        let slot = row
            .entry(attribute)
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => items.push(related),
            other => *other = Value::Array(vec![related]),
        }
        Ok(())
    }
}
