//! Relational fields.

use std::fmt;
use std::sync::Arc;

use crate::persistence::RelatedModel;

/// The related model of a foreign-key or many-to-many field, and the
/// attribute that identifies its entities.
#[derive(Clone)]
pub struct Relation {
    model: Arc<dyn RelatedModel>,
    unique_field: String,
    separator: String,
}

impl Relation {
    pub fn new(model: Arc<dyn RelatedModel>, unique_field: impl Into<String>) -> Self {
        Self {
            model,
            unique_field: unique_field.into(),
            separator: ",".to_string(),
        }
    }

    /// Separator between keys when a many-to-many field reads a single cell.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn model(&self) -> &dyn RelatedModel {
        self.model.as_ref()
    }

    pub(crate) fn shared_model(&self) -> Arc<dyn RelatedModel> {
        Arc::clone(&self.model)
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn unique_field(&self) -> &str {
        &self.unique_field
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("model", &self.model.name())
            .field("unique_field", &self.unique_field)
            .field("separator", &self.separator)
            .finish()
    }
}
