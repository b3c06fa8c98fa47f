//! Schemas declared as JSON.
//!
//! ```json
//! {
//!   "name": "People",
//!   "options": { "start_row": 2, "label_row": 1 },
//!   "default_filters": [{ "type": "trim" }],
//!   "fields": [
//!     { "name": "name", "type": "text", "max_length": 40, "blank": false },
//!     { "name": "age", "type": "integer" },
//!     { "name": "smoker", "type": "boolean", "default": false }
//!   ],
//!   "model": { "name": "Person", "attributes": ["name", "age", "smoker"] }
//! }
//! ```
//!
//! Relational fields need a lookup implemented in code and cannot be declared
//! here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::HarvestOptions;
use crate::error::{ConfigResult, ConfigurationError};
use crate::fields::{BooleanKeywords, DefaultsOrder, Field, FieldKind, FieldType};
use crate::filters::{FilterChain, FilterSpec};
use crate::persistence::MemoryModel;
use crate::schema::Schema;

/// A complete schema declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,

    #[serde(default)]
    pub options: HarvestOptions,

    /// Fields in declaration order
    pub fields: Vec<FieldConfig>,

    #[serde(default)]
    pub default_filters: Vec<FilterSpec>,

    #[serde(default)]
    pub type_filters: HashMap<FieldType, Vec<FilterSpec>>,

    #[serde(default)]
    pub process_first: Vec<String>,

    #[serde(default)]
    pub process_last: Vec<String>,

    /// Persistence target, backed by an in-memory table
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

/// Name and attribute list of the persistence target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub attributes: Vec<String>,
}

/// One field declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(flatten)]
    pub kind: KindConfig,

    #[serde(default = "default_colspan")]
    pub colspan: usize,

    #[serde(default)]
    pub default: Value,

    #[serde(default = "default_blank")]
    pub blank: bool,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,

    #[serde(default)]
    pub computed: bool,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    #[serde(default)]
    pub defaults: DefaultsOrder,
}

fn default_colspan() -> usize {
    1
}

fn default_blank() -> bool {
    true
}

/// Field type and its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindConfig {
    Raw,
    Text {
        #[serde(default)]
        max_length: Option<usize>,
    },
    Integer,
    Float,
    Decimal,
    Boolean {
        #[serde(default)]
        true_values: Option<Vec<String>>,
        #[serde(default)]
        false_values: Option<Vec<String>>,
        #[serde(default)]
        null_values: Option<Vec<String>>,
        #[serde(default)]
        case_sensitive: bool,
    },
}

impl KindConfig {
    fn to_kind(&self) -> FieldKind {
        match self {
            KindConfig::Raw => FieldKind::Raw,
            KindConfig::Text { max_length } => FieldKind::Text {
                max_length: *max_length,
            },
            KindConfig::Integer => FieldKind::Integer,
            KindConfig::Float => FieldKind::Float,
            KindConfig::Decimal => FieldKind::Decimal,
            KindConfig::Boolean {
                true_values,
                false_values,
                null_values,
                case_sensitive,
            } => {
                let defaults = BooleanKeywords::default();
                FieldKind::Boolean(BooleanKeywords {
                    true_values: true_values.clone().unwrap_or(defaults.true_values),
                    false_values: false_values.clone().unwrap_or(defaults.false_values),
                    null_values: null_values.clone().unwrap_or(defaults.null_values),
                    case_sensitive: *case_sensitive,
                })
            }
        }
    }
}

impl FieldConfig {
    pub fn to_field(&self) -> ConfigResult<Field> {
        let mut field = Field::new(self.kind.to_kind())
            .colspan(self.colspan)
            .default(self.default.clone())
            .blank(self.blank)
            .defaults(self.defaults)
            .filters(FilterChain::from_specs(&self.filters)?);
        if let Some(target) = &self.target {
            field = field.target(target.clone());
        }
        if self.is_virtual {
            field = field.virtual_field();
        }
        if self.computed {
            field = field.computed();
        }
        Ok(field)
    }
}

impl SchemaConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidSchemaFile(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            let message = format!("cannot read '{}': {}", path.display(), e);
            ConfigurationError::InvalidSchemaFile(message)
        })?;
        Self::from_json(&content)
    }

    /// Build the schema. When a model is declared, the in-memory table
    /// backing it is returned too so saved records can be read back.
    pub fn into_schema(self) -> ConfigResult<(Schema, Option<MemoryModel>)> {
        let mut builder = Schema::builder(self.name.clone())
            .options(self.options.clone())
            .default_filters(FilterChain::from_specs(&self.default_filters)?)
            .process_first(self.process_first.clone())
            .process_last(self.process_last.clone());

        for (field_type, specs) in &self.type_filters {
            builder = builder.type_filters(*field_type, FilterChain::from_specs(specs)?);
        }
        for field in &self.fields {
            builder = builder.field(field.name.clone(), field.to_field()?);
        }

        let model = self
            .model
            .map(|m| MemoryModel::new(m.name, m.attributes));
        if let Some(model) = &model {
            builder = builder.model(Arc::new(model.clone()));
        }

        Ok((builder.build()?, model))
    }
}
