//! Field descriptors.
//!
//! A [`Field`] describes one logical column: how many physical columns it
//! spans, its default, whether it may be blank, where its raw input goes,
//! whether it is written to the model, and how it is filtered and coerced.
//!
//! ```rust,ignore
//! use csv_harvester::fields::{DefaultsOrder, Field};
//!
//! let name = Field::text().max_length(5);
//! let age = Field::integer().blank(false);
//! let phone = Field::raw().colspan(2).defaults(DefaultsOrder::Last);
//! ```

mod kind;
mod relation;

pub use kind::{
    is_absent, BooleanKeywords, FieldKind, FieldType, FALSE_VALUES, NULL_VALUES, TRUE_VALUES,
};
pub use relation::Relation;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::filters::FilterChain;

/// When the default filters run relative to a field's clean hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsOrder {
    /// Filters, then the hook.
    #[default]
    First,
    /// The hook, then filters.
    Last,
    /// No filters at all.
    Ignore,
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) colspan: usize,
    pub(crate) default: Value,
    pub(crate) blank: bool,
    pub(crate) target: Option<String>,
    pub(crate) in_model: bool,
    pub(crate) computed: bool,
    pub(crate) filters: FilterChain,
    pub(crate) defaults_order: DefaultsOrder,
    pub(crate) creation_order: usize,
    pub(crate) referenced_by: BTreeSet<String>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            name: String::new(),
            kind,
            colspan: 1,
            default: Value::Null,
            blank: true,
            target: None,
            in_model: true,
            computed: false,
            filters: FilterChain::new(),
            defaults_order: DefaultsOrder::First,
            creation_order: 0,
            referenced_by: BTreeSet::new(),
        }
    }

    pub fn raw() -> Self {
        Self::new(FieldKind::Raw)
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text { max_length: None })
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn decimal() -> Self {
        Self::new(FieldKind::Decimal)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean(BooleanKeywords::default()))
    }

    pub fn foreign_key(relation: Relation) -> Self {
        Self::new(FieldKind::ForeignKey(relation))
    }

    pub fn many_to_many(relation: Relation) -> Self {
        Self::new(FieldKind::ManyToMany(relation))
    }

    // -------------------------------------------------------------------------
    // Declaration options
    // -------------------------------------------------------------------------

    /// Number of physical columns consumed.
    pub fn colspan(mut self, colspan: usize) -> Self {
        self.colspan = colspan;
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Whether an absent value is accepted (as null).
    pub fn blank(mut self, blank: bool) -> Self {
        self.blank = blank;
        self
    }

    /// Send this field's raw values to another field instead.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Keep the value for use in hooks but never write it to the model.
    pub fn virtual_field(mut self) -> Self {
        self.in_model = false;
        self
    }

    /// Read no column; the value comes from referring fields, a clean hook or
    /// the default.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn filters(mut self, filters: impl Into<FilterChain>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn defaults(mut self, order: DefaultsOrder) -> Self {
        self.defaults_order = order;
        self
    }

    /// Maximum length in characters. Only meaningful for text fields.
    pub fn max_length(mut self, max: usize) -> Self {
        if let FieldKind::Text { max_length } = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    /// Replace the keyword sets of a boolean field.
    pub fn keywords(mut self, keywords: BooleanKeywords) -> Self {
        if let FieldKind::Boolean(current) = &mut self.kind {
            *current = keywords;
        }
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn span(&self) -> usize {
        self.colspan
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn allows_blank(&self) -> bool {
        self.blank
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Number of file columns this field consumes.
    pub fn file_columns(&self) -> usize {
        if self.computed {
            0
        } else {
            self.colspan
        }
    }

    /// Whether the resolved value is written to the model. Fields that feed
    /// another field never are.
    pub fn is_persisted(&self) -> bool {
        self.in_model && self.target.is_none()
    }

    pub fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }

    pub fn defaults_order(&self) -> DefaultsOrder {
        self.defaults_order
    }

    pub fn creation_order(&self) -> usize {
        self.creation_order
    }

    /// Fields whose raw input is redirected into this one.
    pub fn referenced_by(&self) -> &BTreeSet<String> {
        &self.referenced_by
    }

    /// Whether the resolver hands this field a single cell rather than a list.
    pub fn is_single_column(&self) -> bool {
        self.colspan == 1 && self.referenced_by.is_empty()
    }

    // -------------------------------------------------------------------------
    // Cleaning
    // -------------------------------------------------------------------------

    /// Validate and coerce a value.
    ///
    /// Absent values (and values the kind reads as absent, such as a boolean
    /// null keyword) fall back to the default; with no default, a blank field
    /// yields null and a non-blank one fails.
    pub fn clean(&self, value: Value) -> ValidationResult<Value> {
        let coerced = if is_absent(&value) {
            None
        } else {
            self.kind.coerce(&self.name, &value)?
        };
        match coerced {
            Some(clean) => Ok(clean),
            None if !self.default.is_null() => Ok(self.default.clone()),
            None if self.blank => Ok(Value::Null),
            None => Err(ValidationError::new(
                &self.name,
                value,
                ValidationErrorKind::Blank,
            )),
        }
    }
}
