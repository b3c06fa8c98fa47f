//! Records: one CSV row bound to a schema.
//!
//! Loading a row distributes its cells into per-field raw lists. Nothing is
//! converted at that point; every field resolves on first access through
//! [`Record::get`], which lets a clean hook read other fields of the same row
//! in any order. [`Record::bind`] loads and then resolves every field eagerly
//! in processing order.

mod entities;
mod resolver;

pub use entities::{EntityBatch, SharedEntities};

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigResult, ConfigurationError, HarvestResult};
use crate::fields::FieldKind;
use crate::logs::{self, HarvestWarning};
use crate::schema::Schema;

/// A row bound to a schema.
pub struct Record {
    schema: Arc<Schema>,
    line: Option<usize>,
    raw: HashMap<String, Vec<Value>>,
    clean: HashMap<String, Value>,
    /// Fields currently being resolved, for cycle detection.
    resolving: HashSet<String>,
    entities: SharedEntities,
    warnings: Vec<HarvestWarning>,
}

impl Record {
    /// Load a row without resolving anything.
    pub fn load(schema: &Arc<Schema>, row: Vec<String>) -> Self {
        Self::load_with(schema, row, None, EntityBatch::shared())
    }

    /// Load a row read from `line`, sharing related entities with the rest of
    /// its batch.
    pub fn load_with(
        schema: &Arc<Schema>,
        row: Vec<String>,
        line: Option<usize>,
        entities: SharedEntities,
    ) -> Self {
        let mut warnings = Vec::new();
        let expected = schema.expected_columns();
        let found = row.len();
        if found < expected {
            warnings.push(HarvestWarning::ShortRow {
                line,
                expected,
                found,
            });
        } else if found > expected {
            warnings.push(HarvestWarning::TrailingColumns {
                line,
                ignored: found - expected,
            });
        }
        warnings.iter().for_each(logs::log_warning);

        let mut raw: HashMap<String, Vec<Value>> = schema
            .field_names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        let mut cells = row.into_iter();
        for field in schema.fields() {
            let slot = raw.entry(schema.destination(field.name()).to_string()).or_default();
            for _ in 0..field.file_columns() {
                slot.push(cells.next().map(Value::String).unwrap_or(Value::Null));
            }
        }

        Self {
            schema: Arc::clone(schema),
            line,
            raw,
            clean: HashMap::new(),
            resolving: HashSet::new(),
            entities,
            warnings,
        }
    }

    /// Load a row and resolve every field, then run the whole-record hook.
    pub fn bind(schema: &Arc<Schema>, row: Vec<String>) -> HarvestResult<Self> {
        let mut record = Self::load(schema, row);
        record.resolve_all()?;
        Ok(record)
    }

    /// Resolve every field in processing order, then run the whole-record
    /// hook.
    pub fn resolve_all(&mut self) -> HarvestResult<()> {
        let schema = Arc::clone(&self.schema);
        for name in schema.processing_order() {
            self.get(name)?;
        }
        if let Some(hook) = schema.final_clean() {
            hook(self)?;
        }
        Ok(())
    }

    /// Overwrite the resolved value of a field. A later [`get`](Self::get)
    /// returns this value without running the pipeline.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ConfigResult<()> {
        self.schema.require_field(name)?;
        self.clean.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.clean.contains_key(name)
    }

    /// The raw cells routed to a field.
    pub fn raw(&self, name: &str) -> Option<&[Value]> {
        self.raw.get(name).map(Vec::as_slice)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// 1-based file line the row came from, when read from a file.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn warnings(&self) -> &[HarvestWarning] {
        &self.warnings
    }

    /// Resolved values in declaration order. Fields not yet resolved are
    /// left out.
    pub fn values(&self) -> Map<String, Value> {
        self.schema
            .field_names()
            .filter_map(|name| self.clean.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    /// Write the record to the schema's model.
    ///
    /// Related entities created during the batch are saved first. Persisted
    /// fields are assigned and committed; many-to-many values are attached
    /// afterwards, one entity at a time.
    pub fn save(&mut self) -> HarvestResult<Value> {
        let schema = Arc::clone(&self.schema);
        let model = schema.model().ok_or_else(|| ConfigurationError::NoModel {
            schema: schema.name().to_string(),
        })?;

        let mut values = Vec::new();
        for field in schema.fields().filter(|f| f.is_persisted()) {
            values.push((field, self.get(field.name())?));
        }

        self.entities.borrow_mut().save_pending()?;

        let mut instance = model.instantiate();
        let mut associations = Vec::new();
        {
            let entities = self.entities.borrow();
            for (field, value) in values {
                match field.kind() {
                    FieldKind::ManyToMany(relation) => {
                        if let Value::Array(items) = value {
                            for item in items {
                                associations.push((field.name(), entities.refresh(relation, item)));
                            }
                        }
                    }
                    FieldKind::ForeignKey(relation) => {
                        instance.set_attribute(field.name(), entities.refresh(relation, value));
                    }
                    _ => instance.set_attribute(field.name(), value),
                }
            }
        }

        let saved = instance.commit()?;
        for (attribute, related) in associations {
            instance.associate(attribute, related)?;
        }
        Ok(saved)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.name())
            .field("line", &self.line)
            .field("raw", &self.raw)
            .field("clean", &self.clean)
            .field("warnings", &self.warnings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarvestError, ValidationErrorKind};
    use crate::fields::{Field, Relation};
    use crate::logs::WarningCategory;
    use crate::persistence::MemoryModel;
    use serde_json::json;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn people() -> Arc<Schema> {
        Arc::new(
            Schema::builder("People")
                .field("name", Field::text().max_length(5))
                .field("age", Field::integer())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_bind_name_and_age() {
        let record = Record::bind(&people(), row(&["Joe", "22"])).unwrap();
        let expected = json!({"name": "Joe", "age": 22});
        assert_eq!(&record.values(), expected.as_object().unwrap());
        assert!(record.warnings().is_empty());
    }

    #[test]
    fn test_fields_fail_independently() {
        let schema = Arc::new(
            Schema::builder("People")
                .field("name", Field::text().max_length(5))
                .field("age", Field::integer().blank(false))
                .build()
                .unwrap(),
        );

        let mut record = Record::load(&schema, row(&["hello", ""]));
        assert_eq!(record.get("name").unwrap(), json!("hello"));
        let err = record.get("age").unwrap_err();
        assert_eq!(err.as_validation().unwrap().kind, ValidationErrorKind::Blank);

        let mut record = Record::load(&schema, row(&["toolongname", "5"]));
        assert!(record.get("name").unwrap_err().is_validation());
        assert_eq!(record.get("age").unwrap(), json!(5));
    }

    #[test]
    fn test_memo_skips_filters() {
        use crate::filters::Filter;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let schema = Arc::new(
            Schema::builder("S")
                .field(
                    "code",
                    Field::text().filters(Filter::new(move |v| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        v
                    })),
                )
                .build()
                .unwrap(),
        );

        let mut record = Record::load(&schema, row(&["abc"]));
        assert_eq!(record.get("code").unwrap(), json!("abc"));
        assert_eq!(record.get("code").unwrap(), json!("abc"));
        record.set("code", "xyz").unwrap();
        assert_eq!(record.get("code").unwrap(), json!("xyz"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_length_names_column_and_value() {
        let err = Record::bind(&people(), row(&["Joseph", "22"])).unwrap_err();
        let validation = err.as_validation().unwrap();
        assert_eq!(validation.field, "name");
        assert_eq!(validation.kind, ValidationErrorKind::MaxLength { length: 6, max: 5 });
        assert!(err.to_string().contains("Joseph"));
    }

    #[test]
    fn test_short_row_uses_defaults_and_warns() {
        let schema = Arc::new(
            Schema::builder("S")
                .field("a", Field::text())
                .field("b", Field::text())
                .field("c", Field::integer().default(7))
                .build()
                .unwrap(),
        );
        let record = Record::bind(&schema, row(&["x", "y"])).unwrap();
        assert_eq!(record.values()["c"], json!(7));
        assert_eq!(record.warnings().len(), 1);
        assert_eq!(record.warnings()[0].category(), WarningCategory::ColumnCountMismatch);
    }

    #[test]
    fn test_long_row_ignores_trailing_cells() {
        let record = Record::bind(&people(), row(&["Ann", "30", "extra", "more"])).unwrap();
        assert_eq!(record.values().len(), 2);
        assert_eq!(
            record.warnings().to_vec(),
            vec![HarvestWarning::TrailingColumns {
                line: None,
                ignored: 2
            }]
        );
    }

    #[test]
    fn test_boolean_keywords_and_defaults() {
        let schema = Arc::new(
            Schema::builder("S")
                .field("a", Field::boolean())
                .field("b", Field::boolean())
                .field("c", Field::boolean().default(false))
                .build()
                .unwrap(),
        );
        let record = Record::bind(&schema, row(&["Y", "no", "unknown"])).unwrap();
        assert_eq!(record.values()["a"], json!(true));
        assert_eq!(record.values()["b"], json!(false));
        assert_eq!(record.values()["c"], json!(false));

        let err = Record::bind(&schema, row(&["n/a", "no", ""])).unwrap_err();
        assert_eq!(err.as_validation().unwrap().kind, ValidationErrorKind::NotBoolean);
    }

    #[test]
    fn test_lazy_resolution_and_memo() {
        let mut record = Record::load(&people(), row(&["Joe", "22"]));
        assert!(!record.is_resolved("age"));
        assert_eq!(record.get("age").unwrap(), json!(22));
        assert!(record.is_resolved("age"));

        record.set("age", 23).unwrap();
        assert_eq!(record.get("age").unwrap(), json!(23));
        assert!(record.set("height", 1).is_err());
    }

    #[test]
    fn test_hook_reads_other_field() {
        let schema = Arc::new(
            Schema::builder("S")
                .field("first", Field::text())
                .field("last", Field::text())
                .field("full", Field::text().computed())
                .clean_hook("full", |record, _| {
                    let first = record.get("first")?;
                    let last = record.get("last")?;
                    Ok(json!(format!(
                        "{} {}",
                        first.as_str().unwrap_or_default(),
                        last.as_str().unwrap_or_default()
                    )))
                })
                .process_first(["full"])
                .build()
                .unwrap(),
        );
        let record = Record::bind(&schema, row(&["Ada", "Lovelace"])).unwrap();
        assert_eq!(record.values()["full"], json!("Ada Lovelace"));
    }

    #[test]
    fn test_cycle_names_field_and_schema() {
        let schema = Arc::new(
            Schema::builder("Loop")
                .field("a", Field::text())
                .field("b", Field::text())
                .clean_hook("a", |record, _| record.get("b"))
                .clean_hook("b", |record, _| record.get("a"))
                .build()
                .unwrap(),
        );
        let mut record = Record::load(&schema, row(&["1", "2"]));
        let err = record.get("a").unwrap_err();
        match err {
            HarvestError::Configuration(ConfigurationError::CyclicDependency { schema, field }) => {
                assert_eq!((schema.as_str(), field.as_str()), ("Loop", "a"));
            }
            other => panic!("expected a cyclic dependency, got {:?}", other),
        }
        // failures are not memoized
        assert!(!record.is_resolved("a"));
    }

    #[test]
    fn test_targets_merge_into_raw_list() {
        let schema = Arc::new(
            Schema::builder("Venues")
                .field("street", Field::text().target("address"))
                .field("suburb", Field::text().target("address"))
                .field("address", Field::raw().computed())
                .clean_hook("address", |_, value| {
                    let parts: Vec<&str> = value
                        .as_array()
                        .map(|a| a.iter().filter_map(Value::as_str).collect())
                        .unwrap_or_default();
                    Ok(json!(parts.join(", ")))
                })
                .build()
                .unwrap(),
        );
        let record = Record::bind(&schema, row(&["1 Main St", "Springfield"])).unwrap();
        assert_eq!(record.raw("address").unwrap().len(), 2);
        assert_eq!(record.values()["address"], json!("1 Main St, Springfield"));
        assert_eq!(record.values()["street"], Value::Null);
    }

    #[test]
    fn test_final_clean_runs_after_fields() {
        let schema = Arc::new(
            Schema::builder("S")
                .field("low", Field::integer())
                .field("high", Field::integer())
                .final_clean(|record| {
                    let low = record.get("low")?;
                    let high = record.get("high")?;
                    if low.as_i64() > high.as_i64() {
                        return Err(crate::error::ValidationError::custom(
                            "low",
                            low,
                            "must not exceed high",
                        )
                        .into());
                    }
                    Ok(())
                })
                .build()
                .unwrap(),
        );
        assert!(Record::bind(&schema, row(&["1", "2"])).is_ok());
        assert!(Record::bind(&schema, row(&["3", "2"])).unwrap_err().is_validation());
    }

    #[test]
    fn test_save_skips_virtual_and_referring_fields() {
        let model = MemoryModel::new("Person", ["name"]);
        let schema = Arc::new(
            Schema::builder("People")
                .model(Arc::new(model.clone()))
                .field("name", Field::text())
                .field("nickname", Field::text().target("name"))
                .field("age", Field::integer().virtual_field())
                .clean_hook("name", |_, value| {
                    Ok(value.as_array().and_then(|a| a.first().cloned()).unwrap_or_default())
                })
                .build()
                .unwrap(),
        );
        let mut record = Record::bind(&schema, row(&["Ada", "Addie", "36"])).unwrap();
        let saved = record.save().unwrap();
        assert_eq!(saved, json!({"name": "Ada", "id": 1}));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_save_without_model_fails() {
        let mut record = Record::bind(&people(), row(&["Joe", "22"])).unwrap();
        assert!(matches!(
            record.save(),
            Err(HarvestError::Configuration(ConfigurationError::NoModel { .. }))
        ));
    }

    #[test]
    fn test_relational_fields_saved_and_attached() {
        let regions = MemoryModel::new("Region", ["code"]);
        let activities = MemoryModel::new("Activity", ["name"]);
        let venues = MemoryModel::new("Venue", ["name", "region", "activities"]);
        let schema = Arc::new(
            Schema::builder("Venues")
                .model(Arc::new(venues.clone()))
                .field("name", Field::text())
                .field(
                    "region",
                    Field::foreign_key(Relation::new(Arc::new(regions.clone()), "code")),
                )
                .field(
                    "activities",
                    Field::many_to_many(
                        Relation::new(Arc::new(activities.clone()), "name").with_separator(";"),
                    ),
                )
                .build()
                .unwrap(),
        );

        let batch = EntityBatch::shared();
        let first_row = row(&["Hall", "NSW", "dance; music"]);
        let mut first = Record::load_with(&schema, first_row, Some(1), batch.clone());
        let mut second =
            Record::load_with(&schema, row(&["Club", "NSW", "music"]), Some(2), batch.clone());
        first.resolve_all().unwrap();
        second.resolve_all().unwrap();
        assert_eq!(batch.borrow().pending().count(), 3);

        first.save().unwrap();
        second.save().unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(activities.len(), 2);

        let stored = venues.records();
        assert_eq!(stored[0]["region"], json!({"code": "NSW", "id": 1}));
        assert_eq!(stored[0]["activities"].as_array().unwrap().len(), 2);
        assert_eq!(stored[1]["activities"], json!([{"name": "music", "id": 2}]));
    }

    #[test]
    fn test_relation_keys_normalized_across_columns() {
        let activities = MemoryModel::new("Activity", ["name"]);
        let relation = || Relation::new(Arc::new(activities.clone()), "name");
        let schema = Arc::new(
            Schema::builder("S")
                .field("acts", Field::many_to_many(relation()).colspan(2))
                .field("main", Field::foreign_key(relation()))
                .build()
                .unwrap(),
        );

        let batch = EntityBatch::shared();
        let cells = row(&[" dance", "music ", " dance "]);
        let mut record = Record::load_with(&schema, cells, Some(1), batch.clone());
        record.resolve_all().unwrap();

        assert_eq!(
            record.get("acts").unwrap(),
            json!([{"name": "dance"}, {"name": "music"}])
        );
        assert_eq!(record.get("main").unwrap(), json!({"name": "dance"}));
        assert_eq!(batch.borrow().pending().count(), 2);
    }
}
