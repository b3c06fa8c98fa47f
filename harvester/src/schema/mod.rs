//! Schema registry.
//!
//! A [`Schema`] (the "harvester") is an ordered, validated collection of
//! [`Field`]s plus everything needed to resolve them: filter layers, clean
//! hooks, the final whole-record hook, processing order, harvest options and
//! an optional persistence target.
//!
//! Schemas are built once through [`SchemaBuilder`] and are immutable
//! afterwards. Declaration order is tracked by a builder-local sequence
//! number that advances by each field's colspan, so a field declared after a
//! three-column field sorts strictly after all three of its columns.
//!
//! ```rust,ignore
//! use csv_harvester::{Field, Schema};
//!
//! let schema = Schema::builder("People")
//!     .field("name", Field::text().max_length(5))
//!     .field("age", Field::integer().blank(false))
//!     .build()?;
//! ```

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::config::HarvestOptions;
use crate::error::{ConfigResult, ConfigurationError, HarvestResult};
use crate::fields::{Field, FieldType};
use crate::filters::FilterChain;
use crate::persistence::Model;
use crate::record::Record;

/// Per-field clean hook: receives the record (so it can read other fields)
/// and the value so far, returns the replacement value.
pub type CleanHook = Arc<dyn Fn(&mut Record, Value) -> HarvestResult<Value> + Send + Sync>;

/// Whole-record validation run after every field has resolved.
pub type RecordHook = Arc<dyn Fn(&mut Record) -> HarvestResult<()> + Send + Sync>;

/// An immutable, validated harvester schema.
pub struct Schema {
    name: String,
    fields: IndexMap<String, Field>,
    /// Field name -> name of the field whose raw list receives its cells.
    destinations: HashMap<String, String>,
    model: Option<Arc<dyn Model>>,
    default_filters: FilterChain,
    type_filters: HashMap<FieldType, FilterChain>,
    hooks: HashMap<String, CleanHook>,
    final_clean: Option<RecordHook>,
    processing_order: Vec<String>,
    options: HarvestOptions,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Like [`field`](Self::field) but an unknown name is an error.
    pub fn require_field(&self, name: &str) -> ConfigResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownField {
                schema: self.name.clone(),
                field: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn model(&self) -> Option<&Arc<dyn Model>> {
        self.model.as_ref()
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Number of file columns a row is expected to have.
    pub fn expected_columns(&self) -> usize {
        self.fields.values().map(Field::file_columns).sum()
    }

    /// Order of the eager resolution pass.
    pub fn processing_order(&self) -> &[String] {
        &self.processing_order
    }

    /// Name of the field whose raw list receives `field`'s cells.
    pub fn destination<'a>(&'a self, field: &'a str) -> &'a str {
        self.destinations
            .get(field)
            .map(String::as_str)
            .unwrap_or(field)
    }

    /// The filter layer for a field: its own filters, else the filters for
    /// its type, else the schema-wide defaults.
    pub fn filters_for<'a>(&'a self, field: &'a Field) -> &'a FilterChain {
        if !field.filters.is_empty() {
            return &field.filters;
        }
        match self.type_filters.get(&field.field_type()) {
            Some(chain) if !chain.is_empty() => chain,
            _ => &self.default_filters,
        }
    }

    pub fn hook(&self, field: &str) -> Option<&CleanHook> {
        self.hooks.get(field)
    }

    pub fn final_clean(&self) -> Option<&RecordHook> {
        self.final_clean.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("processing_order", &self.processing_order)
            .field("options", &self.options)
            .finish()
    }
}

/// Collects field declarations and validates them into a [`Schema`].
pub struct SchemaBuilder {
    name: String,
    declared: Vec<(String, Field)>,
    model: Option<Arc<dyn Model>>,
    default_filters: FilterChain,
    type_filters: HashMap<FieldType, FilterChain>,
    hooks: Vec<(String, CleanHook)>,
    final_clean: Option<RecordHook>,
    process_first: Vec<String>,
    process_last: Vec<String>,
    options: HarvestOptions,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: Vec::new(),
            model: None,
            default_filters: FilterChain::new(),
            type_filters: HashMap::new(),
            hooks: Vec::new(),
            final_clean: None,
            process_first: Vec::new(),
            process_last: Vec::new(),
            options: HarvestOptions::default(),
        }
    }

    /// Declare the next field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.declared.push((name.into(), field));
        self
    }

    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Filters for fields with no filters of their own and no type filters.
    pub fn default_filters(mut self, filters: impl Into<FilterChain>) -> Self {
        self.default_filters = filters.into();
        self
    }

    /// Filters for every field of `field_type` without filters of its own.
    pub fn type_filters(mut self, field_type: FieldType, filters: impl Into<FilterChain>) -> Self {
        self.type_filters.insert(field_type, filters.into());
        self
    }

    /// Register the clean hook of `field`.
    pub fn clean_hook<F>(mut self, field: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Record, Value) -> HarvestResult<Value> + Send + Sync + 'static,
    {
        self.hooks.push((field.into(), Arc::new(hook)));
        self
    }

    /// Register the whole-record validation hook.
    pub fn final_clean<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> HarvestResult<()> + Send + Sync + 'static,
    {
        self.final_clean = Some(Arc::new(hook));
        self
    }

    pub fn process_first<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process_first = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn process_last<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process_last = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(mut self, options: HarvestOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the declarations and freeze them into a schema.
    pub fn build(self) -> ConfigResult<Schema> {
        let schema_name = self.name;
        let err_field = |field: &str| (schema_name.clone(), field.to_string());

        // Name, order and span
        let mut fields: IndexMap<String, Field> = IndexMap::with_capacity(self.declared.len());
        let mut sequence = 0usize;
        for (name, mut field) in self.declared {
            if fields.contains_key(&name) {
                let (schema, field) = err_field(&name);
                return Err(ConfigurationError::DuplicateField { schema, field });
            }
            if field.colspan == 0 {
                let (schema, field) = err_field(&name);
                return Err(ConfigurationError::InvalidColspan { schema, field });
            }
            field.name = name.clone();
            field.creation_order = sequence;
            field.referenced_by.clear();
            sequence += field.colspan;
            fields.insert(name, field);
        }
        fields.sort_by(|_, a, _, b| a.creation_order.cmp(&b.creation_order));

        // Targets must exist before anything is resolved
        let mut destinations = HashMap::new();
        for (name, field) in &fields {
            if field.target.is_none() {
                continue;
            }
            let destination = resolve_target(&schema_name, &fields, name)?;
            destinations.insert(name.clone(), destination);
        }
        for (name, destination) in &destinations {
            if let Some(target) = fields.get_mut(destination) {
                target.referenced_by.insert(name.clone());
            }
        }

        // Persisted fields need a model attribute, when there is a model
        if let Some(model) = &self.model {
            if let Some(missing) = fields
                .values()
                .find(|f| f.is_persisted() && !model.has_attribute(&f.name))
            {
                return Err(ConfigurationError::MissingModelAttribute {
                    schema: schema_name.clone(),
                    model: model.name().to_string(),
                    field: missing.name.clone(),
                });
            }
        }

        let mut hooks = HashMap::new();
        for (field, hook) in self.hooks {
            if !fields.contains_key(&field) {
                let (schema, field) = err_field(&field);
                return Err(ConfigurationError::UnknownHookField { schema, field });
            }
            hooks.insert(field, hook);
        }

        let processing_order =
            processing_order(&schema_name, &fields, &self.process_first, &self.process_last)?;

        self.options.validate()?;

        Ok(Schema {
            name: schema_name,
            fields,
            destinations,
            model: self.model,
            default_filters: self.default_filters,
            type_filters: self.type_filters,
            hooks,
            final_clean: self.final_clean,
            processing_order,
            options: self.options,
        })
    }
}

/// Follow `target` links from `start` to the field that finally receives the
/// raw values.
fn resolve_target(
    schema: &str,
    fields: &IndexMap<String, Field>,
    start: &str,
) -> ConfigResult<String> {
    let mut visited = HashSet::from([start.to_string()]);
    let mut current = start.to_string();

    while let Some(target) = fields.get(&current).and_then(|f| f.target.clone()) {
        if target == current {
            return Err(ConfigurationError::SelfTarget {
                schema: schema.to_string(),
                field: current,
            });
        }
        if !fields.contains_key(&target) {
            return Err(ConfigurationError::UnknownTarget {
                schema: schema.to_string(),
                field: current,
                target,
            });
        }
        if !visited.insert(target.clone()) {
            return Err(ConfigurationError::TargetCycle {
                schema: schema.to_string(),
                field: start.to_string(),
            });
        }
        current = target;
    }

    Ok(current)
}

fn processing_order(
    schema: &str,
    fields: &IndexMap<String, Field>,
    first: &[String],
    last: &[String],
) -> ConfigResult<Vec<String>> {
    for (list, names) in [("process_first", first), ("process_last", last)] {
        if let Some(unknown) = names.iter().find(|n| !fields.contains_key(*n)) {
            return Err(ConfigurationError::UnknownProcessingField {
                schema: schema.to_string(),
                list,
                field: unknown.clone(),
            });
        }
    }

    let mut order: Vec<String> = Vec::with_capacity(fields.len());
    let mut push = |name: &String| {
        if !order.contains(name) {
            order.push(name.clone());
        }
    };
    first.iter().for_each(&mut push);
    fields
        .keys()
        .filter(|name| !last.contains(name))
        .for_each(&mut push);
    last.iter().for_each(&mut push);

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{self, Filter};
    use crate::persistence::MemoryModel;
    use serde_json::json;

    #[test]
    fn test_fields_sorted_by_declaration() {
        let schema = Schema::builder("S")
            .field("a", Field::text())
            .field("b", Field::raw().colspan(3))
            .field("c", Field::integer())
            .build()
            .unwrap();

        let names: Vec<_> = schema.field_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let b = schema.field("b").unwrap();
        let c = schema.field("c").unwrap();
        assert_eq!(b.creation_order(), 1);
        assert!(c.creation_order() >= b.creation_order() + 3);
        assert_eq!(schema.expected_columns(), 5);
    }

    #[test]
    fn test_duplicate_and_zero_span_rejected() {
        let err = Schema::builder("S")
            .field("a", Field::text())
            .field("a", Field::text())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateField { .. }));

        let err = Schema::builder("S")
            .field("a", Field::text().colspan(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidColspan { .. }));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = Schema::builder("Venues")
            .field("street", Field::text().target("address"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownTarget {
                schema: "Venues".into(),
                field: "street".into(),
                target: "address".into(),
            }
        );
    }

    #[test]
    fn test_target_populates_referenced_by() {
        let schema = Schema::builder("Venues")
            .field("street", Field::text().target("address"))
            .field("suburb", Field::text().target("address"))
            .field("address", Field::raw())
            .build()
            .unwrap();

        let address = schema.field("address").unwrap();
        let referrers: Vec<_> = address.referenced_by().iter().map(String::as_str).collect();
        assert_eq!(referrers, vec!["street", "suburb"]);
        assert!(!address.is_single_column());
        assert_eq!(schema.destination("street"), "address");
        assert_eq!(schema.destination("address"), "address");
    }

    #[test]
    fn test_target_chain_and_cycles() {
        let schema = Schema::builder("S")
            .field("a", Field::text().target("b"))
            .field("b", Field::text().target("c"))
            .field("c", Field::raw())
            .build()
            .unwrap();
        assert_eq!(schema.destination("a"), "c");
        assert_eq!(schema.field("c").unwrap().referenced_by().len(), 2);

        let err = Schema::builder("S")
            .field("a", Field::text().target("b"))
            .field("b", Field::text().target("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::TargetCycle { .. }));

        let err = Schema::builder("S")
            .field("a", Field::text().target("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::SelfTarget { .. }));
    }

    #[test]
    fn test_model_attributes_checked() {
        let model = Arc::new(MemoryModel::new("Person", ["name"]));
        let err = Schema::builder("People")
            .model(model.clone())
            .field("name", Field::text())
            .field("age", Field::integer())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingModelAttribute { ref field, .. } if field == "age"
        ));

        // virtual and referring fields are not checked
        Schema::builder("People")
            .model(model)
            .field("name", Field::text())
            .field("age", Field::integer().virtual_field())
            .field("nickname", Field::text().target("name"))
            .build()
            .unwrap();
    }

    #[test]
    fn test_processing_order() {
        let schema = Schema::builder("S")
            .field("a", Field::text())
            .field("b", Field::text())
            .field("c", Field::text())
            .field("d", Field::text())
            .process_first(["c"])
            .process_last(["a"])
            .build()
            .unwrap();
        assert_eq!(schema.processing_order(), ["c", "b", "d", "a"]);

        let err = Schema::builder("S")
            .field("a", Field::text())
            .process_last(["zzz"])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnknownProcessingField { list: "process_last", .. }
        ));
    }

    #[test]
    fn test_hook_for_unknown_field_rejected() {
        let err = Schema::builder("S")
            .field("a", Field::text())
            .clean_hook("b", |_, v| Ok(v))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownHookField { .. }));
    }

    #[test]
    fn test_filter_layers() {
        let upper = Filter::new(|v| json!(v.as_str().unwrap_or_default().to_uppercase()));
        let schema = Schema::builder("S")
            .field("own", Field::text().filters(upper))
            .field("typed", Field::text())
            .field("other", Field::integer())
            .type_filters(FieldType::Text, filters::strip_chars("*"))
            .default_filters(filters::strip())
            .build()
            .unwrap();

        let apply = |name: &str, v: Value| {
            let field = schema.field(name).unwrap();
            schema.filters_for(field).apply(v)
        };
        assert_eq!(apply("own", json!("ab")), json!("AB"));
        assert_eq!(apply("typed", json!("*ab*")), json!("ab"));
        assert_eq!(apply("other", json!(" 5 ")), json!("5"));
    }
}
